//! Random one-time secrets.

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

/// Length of the email verification code
pub const VERIFICATION_CODE_LENGTH: usize = 64;

/// `len` uniformly random decimal digits (leading zeros allowed)
pub fn numeric_code(len: usize) -> String {
    (0..len)
        .map(|_| char::from(b'0' + OsRng.gen_range(0..10u8)))
        .collect()
}

/// `len` random ASCII letters and digits
pub fn alphanumeric_code(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn verification_code() -> String {
    alphanumeric_code(VERIFICATION_CODE_LENGTH)
}
