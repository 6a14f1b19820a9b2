//! # carta-crypto: Cryptographic primitives for `Carta`
//!
//! This crate provides the cryptographic foundation for `Carta`'s encrypted
//! record store and tamper-evident version history.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`encryption`] | AES-256-GCM authenticated encryption and key wrapping |
//! | [`hash`] | SHA-256/SHA-512 digests and BLAKE3 content fingerprints |
//! | [`signature`] | Ed25519 signatures for non-repudiation |
//! | [`keyring`] | Key registry with generation and rotation |
//!
//! ## Quick Start
//!
//! ```
//! use carta_crypto::{encrypt, decrypt, EncryptionKey, HashAlgorithm, hash_hex};
//! use carta_types::KeyId;
//!
//! let key = EncryptionKey::generate();
//! let key_id = KeyId::generate();
//!
//! let payload = encrypt(&key, key_id, b"clinical note");
//! let plaintext = decrypt(&key, &payload).unwrap();
//! assert_eq!(plaintext, b"clinical note");
//!
//! // Deterministic hex digest of plaintext content
//! let digest = hash_hex(HashAlgorithm::Sha256, b"clinical note");
//! assert_eq!(digest.len(), 64);
//! ```

pub mod encryption;
pub mod error;
pub mod hash;
pub mod keyring;
pub mod signature;

pub use encryption::{
    CipherSuite, EncryptedPayload, EncryptionKey, Iv, IV_LENGTH, KEY_LENGTH, TAG_LENGTH,
    decrypt, encrypt,
};
pub use error::{CryptoError, CryptoResult};
pub use hash::{ContentFingerprint, HashAlgorithm, content_hash, fingerprint, hash_hex};
pub use keyring::{KeyPurpose, Keyring, random_bytes, random_string};
pub use signature::{Signature, SigningKey, VerifyingKey};
