//! Content-address derivation.
//!
//! Addresses are CIDv1-compatible strings in base16 multibase form:
//! an `f` prefix followed by the hex of `[version, codec, hash-code,
//! hash-length, digest]`. The digest is BLAKE3 over the ciphertext bytes,
//! so the address is a pure function of the stored blob.
//!
//! Callers must treat the result as opaque — the layout here exists only so
//! the address round-trips through systems that expect CIDv1 shape.

use carta_crypto::fingerprint;
use carta_types::Cid;

// ============================================================================
// Constants
// ============================================================================

/// CID version byte (CIDv1).
const CID_VERSION: u8 = 0x01;

/// Multicodec for raw binary content.
const CODEC_RAW: u8 = 0x55;

/// Multihash code for BLAKE3.
const MULTIHASH_BLAKE3: u8 = 0x1e;

/// Digest length in bytes.
const DIGEST_LENGTH: u8 = 32;

// ============================================================================
// Derivation
// ============================================================================

/// Derives the content address for a ciphertext blob.
///
/// Deterministic: the same bytes always yield the same address, which makes
/// re-uploads idempotent and lets a store verify a blob against its address.
pub fn cid_for_ciphertext(ciphertext: &[u8]) -> Cid {
    let digest = fingerprint(ciphertext);

    let mut raw = Vec::with_capacity(4 + DIGEST_LENGTH as usize);
    raw.push(CID_VERSION);
    raw.push(CODEC_RAW);
    raw.push(MULTIHASH_BLAKE3);
    raw.push(DIGEST_LENGTH);
    raw.extend_from_slice(digest.as_bytes());

    Cid::new(format!("f{}", hex::encode(raw)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_address() {
        let a = cid_for_ciphertext(b"identical ciphertext");
        let b = cid_for_ciphertext(b"identical ciphertext");

        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_different_address() {
        assert_ne!(
            cid_for_ciphertext(b"ciphertext one"),
            cid_for_ciphertext(b"ciphertext two")
        );
    }

    #[test]
    fn address_shape_is_stable() {
        let cid = cid_for_ciphertext(b"blob");
        let s = cid.as_str();

        // multibase prefix + 4 header bytes + 32 digest bytes in hex
        assert!(s.starts_with("f01551e20"));
        assert_eq!(s.len(), 1 + 2 * (4 + 32));
        assert!(s[1..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
