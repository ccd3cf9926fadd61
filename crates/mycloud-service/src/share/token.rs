//! Public share token generation.

use std::fmt::Write;

use rand::Rng;

/// Random bytes per token.
const TOKEN_BYTES: usize = 32;

/// Generate a 64-character lowercase hex token from a CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes[..]);
    bytes.iter().fold(String::with_capacity(TOKEN_BYTES * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
