//! Cryptographic building blocks shared by the account workspace.

pub mod hash;
pub mod jwt;

pub use hash::{sha256, sha256_hex};
pub use jwt::{issue_token, issue_token_with_id, verify_token, KeyPair, TokenError};
