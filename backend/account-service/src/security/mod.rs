pub mod codes;
pub mod otp;
pub mod password;
pub mod session;

pub use otp::OtpManager;
pub use password::{ensure_passwords_match, hash_password, verify_password};
pub use session::{AuthenticatedUser, SessionManager, TokenConfig};
