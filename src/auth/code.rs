use anyhow::Context;
use rand::{rngs::OsRng, RngCore};

/// Length of password reset codes.
pub const RESET_CODE_LEN: usize = 6;

/// Largest multiple of 10 that fits in a byte; bytes at or above it are
/// discarded so every digit is equally likely.
const DIGIT_CUTOFF: u8 = 250;

/// Returns `length` decimal digits drawn from the operating system CSPRNG.
///
/// A failing entropy source fails the call; there is no fallback.
pub fn generate_numeric_code(length: usize) -> anyhow::Result<String> {
    let mut code = String::with_capacity(length);
    let mut buf = [0u8; 16];
    while code.len() < length {
        OsRng
            .try_fill_bytes(&mut buf)
            .context("read from OS random source")?;
        for b in buf.iter().copied().filter(|b| *b < DIGIT_CUTOFF) {
            if code.len() == length {
                break;
            }
            code.push(char::from(b'0' + b % 10));
        }
    }
    Ok(code)
}
