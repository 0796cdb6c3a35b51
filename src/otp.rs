//! One-time code generation

use rand::Rng;
use rand::rngs::OsRng;

/// Code length used when none is configured
pub const DEFAULT_OTP_LENGTH: usize = 6;

/// Generate `length` decimal digits, each drawn uniformly from the
/// operating system's CSPRNG
pub fn generate_otp(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Generate a code of [`DEFAULT_OTP_LENGTH`] digits
pub fn generate_default_otp() -> String {
    generate_otp(DEFAULT_OTP_LENGTH)
}
