pub mod accounts;
pub mod drive;
pub mod email;
pub mod ownership;
pub mod products;

pub use accounts::AccountService;
pub use drive::DriveService;
pub use email::{EmailDispatcher, EmailSender, RecordingEmailSender, SmtpEmailSender};
pub use products::ProductService;
