//! # secchat-crypto
//!
//! Payload obfuscation and identity helpers.
//!
//! - [`cipher`]: password-derived key, nonce-prefixed XOR stream over text
//!   (base64 wire form) and binary payloads
//! - [`identity`]: password hashing and user ID generation
//!
//! The cipher is **not** cryptographically secure. The key derivation is a
//! 32-bit rolling hash with a fixed suffix and the keystream is a repeating
//! XOR. It exists to stay wire-compatible with existing clients and only
//! keeps casual observers from reading payloads.

#![deny(unsafe_code)]

pub mod cipher;
pub mod errors;
pub mod identity;

pub use cipher::{
    CipherKey, KEY_LEN, NONCE_LEN, PayloadCipher, UNDECIPHERABLE, decrypt, decrypt_binary,
    decrypt_checked, derive_key, encrypt, encrypt_binary,
};
pub use errors::CipherError;
pub use identity::{deterministic_user_id, generate_user_id, hash_password};
