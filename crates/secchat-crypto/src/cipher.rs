//! Nonce-prefixed XOR payload cipher.
//!
//! Wire layout (before base64 for text payloads):
//!
//! ```text
//! ┌──────────── 12 bytes ────────────┬──────── n bytes ────────┐
//! │ nonce                            │ data[i] ^ key[i % 32]   │
//! │                                  │         ^ nonce[i % 12] │
//! └──────────────────────────────────┴─────────────────────────┘
//! ```
//!
//! Key derivation: a 32-bit rolling hash (`h = h * 31 + unit`, wrapping) over
//! the UTF-16 code units of `password + KEY_SUFFIX`, expanded to 32 bytes as
//! `|h × (i + 1)| mod 256`.

use std::fmt;

use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{Engine, alphabet};
use rand::Rng;
use tracing::debug;

use crate::errors::CipherError;

/// Length of a derived key in bytes.
pub const KEY_LEN: usize = 32;
/// Length of the random nonce prefix in bytes.
pub const NONCE_LEN: usize = 12;
/// Fixed application suffix appended to the password before hashing.
pub const KEY_SUFFIX: &str = "SecChatSalt2024!";
/// Placeholder returned by [`decrypt`] for payloads that cannot be decrypted.
///
/// Shared with the browser client, which shows the same text in history.
pub const UNDECIPHERABLE: &str = "[无法解密]";

/// Standard alphabet; encodes with padding, decodes with or without it and
/// tolerates non-zero trailing bits, as browsers' `atob` does.
const WIRE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

// ─────────────────────────────────────────────────────────────────────────────
// Key derivation
// ─────────────────────────────────────────────────────────────────────────────

/// A derived payload key. Never transmitted.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherKey([u8; KEY_LEN]);

impl CipherKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherKey(<redacted>)")
    }
}

/// Rolling 32-bit hash over UTF-16 code units.
pub(crate) fn rolling_hash(input: &str) -> i32 {
    input.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

/// Derive the payload key for a password.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn derive_key(password: &str) -> CipherKey {
    let hash = i64::from(rolling_hash(&format!("{password}{KEY_SUFFIX}")));
    let mut key = [0u8; KEY_LEN];
    for (i, byte) in key.iter_mut().enumerate() {
        // |hash × (i+1)| < 2^36, and the remainder keeps the dividend's sign.
        *byte = ((hash * (i as i64 + 1)) % 256).unsigned_abs() as u8;
    }
    CipherKey(key)
}

// ─────────────────────────────────────────────────────────────────────────────
// Keystream
// ─────────────────────────────────────────────────────────────────────────────

fn apply_keystream(data: &[u8], key: &CipherKey, nonce: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ key.0[i % KEY_LEN] ^ nonce[i % NONCE_LEN])
        .collect()
}

fn fresh_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill(&mut nonce);
    nonce
}

fn seal(data: &[u8], key: &CipherKey, nonce: &[u8; NONCE_LEN]) -> Vec<u8> {
    let mut combined = Vec::with_capacity(NONCE_LEN + data.len());
    combined.extend_from_slice(nonce);
    combined.extend(apply_keystream(data, key, nonce));
    combined
}

fn open(combined: &[u8], key: &CipherKey) -> Result<Vec<u8>, CipherError> {
    if combined.len() < NONCE_LEN {
        return Err(CipherError::Truncated {
            len: combined.len(),
            min: NONCE_LEN,
        });
    }
    let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
    Ok(apply_keystream(ciphertext, key, nonce))
}

// ─────────────────────────────────────────────────────────────────────────────
// Text payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Encrypt text to its base64 wire form under a fresh nonce.
#[must_use]
pub fn encrypt(plaintext: &str, key: &CipherKey) -> String {
    encrypt_with_nonce(plaintext, key, &fresh_nonce())
}

fn encrypt_with_nonce(plaintext: &str, key: &CipherKey, nonce: &[u8; NONCE_LEN]) -> String {
    WIRE.encode(seal(plaintext.as_bytes(), key, nonce))
}

/// Decrypt a base64 wire payload, reporting structural failures.
///
/// Bytes that do not form valid UTF-8 (e.g. a wrong key) are replaced with
/// U+FFFD rather than rejected.
pub fn decrypt_checked(payload: &str, key: &CipherKey) -> Result<String, CipherError> {
    let combined = WIRE
        .decode(payload.trim())
        .map_err(|e| CipherError::InvalidEncoding(e.to_string()))?;
    let plain = open(&combined, key)?;
    Ok(String::from_utf8_lossy(&plain).into_owned())
}

/// Decrypt a base64 wire payload; never fails.
///
/// Malformed payloads yield [`UNDECIPHERABLE`].
#[must_use]
pub fn decrypt(payload: &str, key: &CipherKey) -> String {
    decrypt_checked(payload, key).unwrap_or_else(|e| {
        debug!(error = %e, "payload could not be decrypted");
        UNDECIPHERABLE.to_owned()
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Binary payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Encrypt raw bytes (e.g. an image); returns `nonce || ciphertext`.
#[must_use]
pub fn encrypt_binary(data: &[u8], key: &CipherKey) -> Vec<u8> {
    seal(data, key, &fresh_nonce())
}

/// Decrypt `nonce || ciphertext` produced by [`encrypt_binary`].
pub fn decrypt_binary(data: &[u8], key: &CipherKey) -> Result<Vec<u8>, CipherError> {
    open(data, key)
}

// ─────────────────────────────────────────────────────────────────────────────
// PayloadCipher
// ─────────────────────────────────────────────────────────────────────────────

/// A cipher bound to one password-derived key.
#[derive(Clone, Debug)]
pub struct PayloadCipher {
    key: CipherKey,
}

impl PayloadCipher {
    /// Derive the key once for `password`.
    #[must_use]
    pub fn from_password(password: &str) -> Self {
        Self {
            key: derive_key(password),
        }
    }

    /// Use an already derived key.
    #[must_use]
    pub fn new(key: CipherKey) -> Self {
        Self { key }
    }

    /// The derived key.
    #[must_use]
    pub fn key(&self) -> &CipherKey {
        &self.key
    }

    /// See [`encrypt`].
    #[must_use]
    pub fn encrypt(&self, plaintext: &str) -> String {
        encrypt(plaintext, &self.key)
    }

    /// See [`decrypt`].
    #[must_use]
    pub fn decrypt(&self, payload: &str) -> String {
        decrypt(payload, &self.key)
    }

    /// See [`encrypt_binary`].
    #[must_use]
    pub fn encrypt_binary(&self, data: &[u8]) -> Vec<u8> {
        encrypt_binary(data, &self.key)
    }

    /// See [`decrypt_binary`].
    pub fn decrypt_binary(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        decrypt_binary(data, &self.key)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    const SECRET_KEY: [u8; KEY_LEN] = [
        238, 220, 202, 184, 166, 148, 130, 112, 94, 76, 58, 40, 22, 4, 242, 224, 206, 188, 170,
        152, 134, 116, 98, 80, 62, 44, 26, 8, 246, 228, 210, 192,
    ];

    #[test]
    fn derive_key_matches_reference_vector() {
        assert_eq!(derive_key("secret").as_bytes(), &SECRET_KEY);
    }

    #[test]
    fn derive_key_empty_password() {
        let key = derive_key("");
        assert_eq!(&key.as_bytes()[..4], &[98, 196, 38, 136]);
        assert_eq!(key.as_bytes()[31], 64);
    }

    #[test]
    fn derive_key_hashes_utf16_units() {
        let key = derive_key("密码");
        assert_eq!(&key.as_bytes()[..4], &[163, 70, 233, 140]);
    }

    #[test]
    fn rolling_hash_reference_values() {
        assert_eq!(rolling_hash("secretSecChatSalt2024!"), -908_463_598);
        assert_eq!(rolling_hash(""), 0);
    }

    #[test]
    fn encrypt_with_fixed_nonce_matches_reference() {
        let nonce = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let wire = encrypt_with_nonce("hello", &derive_key("secret"), &nonce);
        assert_eq!(wire, "AQIDBAUGBwgJCgsMh7ul0Mw=");
    }

    #[test]
    fn unpadded_payloads_decrypt() {
        let key = derive_key("secret");
        assert_eq!(decrypt("AQIDBAUGBwgJCgsMh7ul0Mw", &key), "hello");
        assert_eq!(decrypt("AQIDBAUGBwgJCgsMh7ul0Mw=", &key), "hello");
    }

    #[test]
    fn placeholder_matches_browser_client() {
        assert_eq!(UNDECIPHERABLE, "[无法解密]");
    }

    #[test]
    fn same_plaintext_gives_different_ciphertexts() {
        let key = derive_key("pw");
        let a = encrypt("same message", &key);
        let b = encrypt("same message", &key);
        assert_ne!(a, b);
        assert_eq!(decrypt(&a, &key), "same message");
        assert_eq!(decrypt(&b, &key), "same message");
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let key = derive_key("pw");
        let wire = encrypt("", &key);
        assert_eq!(decrypt_checked(&wire, &key).unwrap(), "");
    }

    #[test]
    fn invalid_base64_yields_placeholder() {
        let key = derive_key("pw");
        assert_eq!(decrypt("not base64 at all!!", &key), UNDECIPHERABLE);
        assert_matches!(
            decrypt_checked("%%%", &key),
            Err(CipherError::InvalidEncoding(_))
        );
    }

    #[test]
    fn short_payload_yields_placeholder() {
        let key = derive_key("pw");
        let short = WIRE.encode([1u8, 2, 3]);
        assert_eq!(decrypt(&short, &key), UNDECIPHERABLE);
        assert_matches!(
            decrypt_checked(&short, &key),
            Err(CipherError::Truncated { len: 3, min: NONCE_LEN })
        );
    }

    #[test]
    fn wrong_key_does_not_panic() {
        let wire = encrypt("你好, world", &derive_key("right"));
        let out = decrypt(&wire, &derive_key("wrong"));
        assert_ne!(out, "你好, world");
    }

    #[test]
    fn binary_round_trip_and_layout() {
        let key = derive_key("pw");
        let data: Vec<u8> = (0..=255).collect();
        let sealed = encrypt_binary(&data, &key);
        assert_eq!(sealed.len(), NONCE_LEN + data.len());
        assert_eq!(decrypt_binary(&sealed, &key).unwrap(), data);
    }

    #[test]
    fn binary_truncated_is_error() {
        let key = derive_key("pw");
        assert_matches!(
            decrypt_binary(&[0u8; 5], &key),
            Err(CipherError::Truncated { len: 5, .. })
        );
    }

    #[test]
    fn payload_cipher_methods() {
        let cipher = PayloadCipher::from_password("secret");
        assert_eq!(cipher.key().as_bytes(), &SECRET_KEY);
        let wire = cipher.encrypt("hi");
        assert_eq!(cipher.decrypt(&wire), "hi");
        let sealed = cipher.encrypt_binary(b"\x89PNG");
        assert_eq!(cipher.decrypt_binary(&sealed).unwrap(), b"\x89PNG");
    }

    #[test]
    fn key_debug_is_redacted() {
        let debug = format!("{:?}", derive_key("secret"));
        assert!(!debug.contains("238"));
    }

    proptest! {
        #[test]
        fn text_round_trip(plaintext in ".*", password in ".*") {
            let key = derive_key(&password);
            prop_assert_eq!(decrypt(&encrypt(&plaintext, &key), &key), plaintext);
        }

        #[test]
        fn binary_round_trip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let key = derive_key("pw");
            prop_assert_eq!(decrypt_binary(&encrypt_binary(&data, &key), &key).unwrap(), data);
        }

        #[test]
        fn decrypt_never_panics(payload in ".*") {
            let key = derive_key("pw");
            let _ = decrypt(&payload, &key);
        }
    }
}
