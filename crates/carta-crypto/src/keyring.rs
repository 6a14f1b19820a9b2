//! In-process key registry with generation and rotation.
//!
//! The keyring maps [`KeyId`]s to live key material so callers can encrypt
//! by key ID without ever holding raw keys. Rotation retires a key without
//! destroying its material — historical ciphertexts stay decryptable.
//!
//! This registry is process-local. Durable, per-record key custody (envelope
//! encryption under a master key) lives in `carta-keys`.

use std::collections::HashMap;
use std::sync::RwLock;

use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};

use carta_types::KeyId;

use crate::encryption::{EncryptedPayload, EncryptionKey, encrypt as aead_encrypt, decrypt as aead_decrypt};
use crate::error::{CryptoError, CryptoResult};

// ============================================================================
// KeyPurpose
// ============================================================================

/// What a generated key is for.
///
/// Recorded with each key so misuse (e.g. signing with a data key) can be
/// caught in review and audit, not just by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    /// Bulk data encryption for record content.
    Data,
    /// Key-wrapping (master/KEK role).
    Wrapping,
}

// ============================================================================
// Keyring
// ============================================================================

struct StoredKey {
    key: EncryptionKey,
    #[allow(dead_code)]
    purpose: KeyPurpose,
    /// Set on rotation. Retired keys still decrypt; they no longer encrypt.
    retired: bool,
}

/// A thread-safe registry of encryption keys addressed by [`KeyId`].
#[derive(Default)]
pub struct Keyring {
    keys: RwLock<HashMap<KeyId, StoredKey>>,
}

impl Keyring {
    /// Creates an empty keyring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh key for `purpose` and returns its ID.
    pub fn generate(&self, purpose: KeyPurpose) -> KeyId {
        let key_id = KeyId::generate();
        self.keys
            .write()
            .expect("keyring lock poisoned")
            .insert(
                key_id.clone(),
                StoredKey {
                    key: EncryptionKey::generate(),
                    purpose,
                    retired: false,
                },
            );
        key_id
    }

    /// Returns the key material for `key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnknownKey`] if no key is registered.
    pub fn key(&self, key_id: &KeyId) -> CryptoResult<EncryptionKey> {
        self.keys
            .read()
            .expect("keyring lock poisoned")
            .get(key_id)
            .map(|stored| stored.key.clone())
            .ok_or_else(|| CryptoError::UnknownKey(key_id.clone()))
    }

    /// Rotates `old_key_id`: generates a replacement and retires the old key.
    ///
    /// The old key material is retained — ciphertexts produced under it
    /// remain decryptable.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnknownKey`] if the old key is not registered.
    pub fn rotate(&self, old_key_id: &KeyId) -> CryptoResult<KeyId> {
        let mut keys = self.keys.write().expect("keyring lock poisoned");

        let old = keys
            .get_mut(old_key_id)
            .ok_or_else(|| CryptoError::UnknownKey(old_key_id.clone()))?;
        let purpose = old.purpose;
        old.retired = true;

        let new_key_id = KeyId::generate();
        keys.insert(
            new_key_id.clone(),
            StoredKey {
                key: EncryptionKey::generate(),
                purpose,
                retired: false,
            },
        );

        Ok(new_key_id)
    }

    /// Encrypts `plaintext` under `key_id`, or under a freshly generated
    /// data key when `key_id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnknownKey`] if the named key is not
    /// registered.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        key_id: Option<KeyId>,
    ) -> CryptoResult<EncryptedPayload> {
        let key_id = match key_id {
            Some(id) => id,
            None => self.generate(KeyPurpose::Data),
        };
        let key = self.key(&key_id)?;
        Ok(aead_encrypt(&key, key_id, plaintext))
    }

    /// Decrypts a payload, resolving the key by the payload's `key_id`.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::UnknownKey`] if the payload names an unregistered key
    /// - [`CryptoError::Integrity`] if the authentication tag does not verify
    pub fn decrypt(&self, payload: &EncryptedPayload) -> CryptoResult<Vec<u8>> {
        let key = self.key(&payload.key_id)?;
        aead_decrypt(&key, payload)
    }

    /// True if the key exists and has been retired by rotation.
    pub fn is_retired(&self, key_id: &KeyId) -> bool {
        self.keys
            .read()
            .expect("keyring lock poisoned")
            .get(key_id)
            .is_some_and(|stored| stored.retired)
    }
}

// ============================================================================
// Randomness
// ============================================================================

/// Returns `n` cryptographically secure random bytes.
///
/// Output is drawn from the OS CSPRNG; it is not derivable from timestamps
/// or counters.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n];
    getrandom::fill(&mut bytes).expect("CSPRNG failure");
    bytes
}

/// Returns a random alphanumeric string of length `n`.
pub fn random_string(n: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
