//! Password hashing and user ID generation.

use std::fmt::Write as _;

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::cipher::rolling_hash;

const ID_PREFIX: &str = "user_";
const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const RANDOM_ID_LEN: usize = 16;

/// SHA-256 of the room password as lowercase hex.
///
/// This is the value the server compares against its configured hash.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Random user ID: `user_` followed by 16 characters from `[a-z0-9]`.
#[must_use]
pub fn generate_user_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..RANDOM_ID_LEN)
        .map(|_| char::from(ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())]))
        .collect();
    format!("{ID_PREFIX}{suffix}")
}

/// Stable user ID derived from a display name.
///
/// `user_` followed by the absolute rolling hash of `input` as at least 8
/// lowercase hex digits. The same nickname maps to the same ID on every
/// device.
#[must_use]
pub fn deterministic_user_id(input: &str) -> String {
    format!("{ID_PREFIX}{:08x}", rolling_hash(input).unsigned_abs())
}
