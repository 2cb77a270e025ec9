//! Password-based symmetric encryption.
//!
//! `encrypt_bytes` stretches the password into a key, encrypts with
//! XChaCha20-Poly1305 under a fresh random nonce, and appends a keyed
//! commitment tag computed over (nonce ‖ MAC). The commitment tag binds the
//! ciphertext to the stretched key, so a ciphertext crafted to decrypt under
//! two different keys ("invisible salamanders") is rejected before the AEAD
//! layer is ever consulted.

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::exchange::{Nonce24, SymmetricKey};

/// Poly1305 MAC length appended to XChaCha20-Poly1305 ciphertexts.
const MAC_BYTES: usize = 16;

/// Stretch a password into a 256-bit key.
///
/// Deterministic: the same password always yields the same key.
pub fn stretch(password: &[u8]) -> SymmetricKey {
    SymmetricKey::from_bytes(blake3::derive_key("roster-crypto-v1-stretch", password))
}

/// The encrypted envelope produced by [`encrypt_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Cipher {
    /// Nonce used for encryption (unique per call).
    nonce: Nonce24,

    /// Keyed commitment tag over (nonce ‖ MAC).
    commitment: [u8; 32],

    /// The encrypted data (includes the Poly1305 MAC).
    ciphertext: Vec<u8>,
}

/// Compute the commitment tag for a ciphertext.
fn commitment_tag(key: &SymmetricKey, nonce: &Nonce24, mac: &[u8]) -> [u8; 32] {
    let mut input = Vec::with_capacity(24 + MAC_BYTES);
    input.extend_from_slice(nonce.as_bytes());
    input.extend_from_slice(mac);
    *blake3::keyed_hash(key.as_bytes(), &input).as_bytes()
}

/// Symmetrically encrypt a byte array with a password.
pub fn encrypt_bytes(payload: &[u8], password: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let key = stretch(password);
    let nonce = Nonce24::generate();
    let ciphertext = key.encrypt(payload, &nonce)?;

    let mac = &ciphertext[ciphertext.len() - MAC_BYTES..];
    let commitment = commitment_tag(&key, &nonce, mac);

    let cipher = Cipher {
        nonce,
        commitment,
        ciphertext,
    };

    let mut buf = Vec::new();
    ciborium::into_writer(&cipher, &mut buf).expect("CBOR serialization failed");
    Ok(buf)
}

/// Decrypt a message produced by [`encrypt_bytes`].
///
/// The commitment tag is verified before any decryption is attempted; a
/// mismatch fails with [`CryptoError::Decrypt`] without touching the AEAD.
pub fn decrypt_bytes(cipher_bytes: &[u8], password: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher: Cipher =
        ciborium::from_reader(cipher_bytes).map_err(|_| CryptoError::Decrypt)?;

    if cipher.ciphertext.len() < MAC_BYTES {
        return Err(CryptoError::Decrypt);
    }

    let key = stretch(password);
    let mac = &cipher.ciphertext[cipher.ciphertext.len() - MAC_BYTES..];
    let expected = commitment_tag(&key, &cipher.nonce, mac);

    // Commitment check comes first: a mismatch means the ciphertext was not
    // produced under this key, so decryption must not be attempted.
    if expected != cipher.commitment {
        return Err(CryptoError::Decrypt);
    }

    key.decrypt(&cipher.ciphertext, &cipher.nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let encrypted = encrypt_bytes(b"hello, world!", b"hunter2").unwrap();
        let decrypted = decrypt_bytes(&encrypted, b"hunter2").unwrap();
        assert_eq!(decrypted, b"hello, world!");
    }

    #[test]
    fn test_roundtrip_empty() {
        let encrypted = encrypt_bytes(b"", b"password").unwrap();
        let decrypted = decrypt_bytes(&encrypted, b"password").unwrap();
        assert_eq!(decrypted, b"");
    }

    #[test]
    fn test_roundtrip_unicode() {
        let payload = "płainté🦀xt".as_bytes();
        let encrypted = encrypt_bytes(payload, "pāsswörd🔑".as_bytes()).unwrap();
        let decrypted = decrypt_bytes(&encrypted, "pāsswörd🔑".as_bytes()).unwrap();
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn test_wrong_password_fails() {
        let encrypted = encrypt_bytes(b"secret", b"right").unwrap();
        assert!(matches!(
            decrypt_bytes(&encrypted, b"wrong"),
            Err(CryptoError::Decrypt)
        ));
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let a = encrypt_bytes(b"same payload", b"same password").unwrap();
        let b = encrypt_bytes(b"same payload", b"same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let encrypted = encrypt_bytes(b"secret", b"password").unwrap();

        // Flip one bit in every position; decryption must always fail.
        for i in 0..encrypted.len() {
            let mut tampered = encrypted.clone();
            tampered[i] ^= 0x01;
            assert!(decrypt_bytes(&tampered, b"password").is_err());
        }
    }

    #[test]
    fn test_commitment_binds_key() {
        // A ciphertext re-tagged with a different key's commitment must be
        // rejected by the commitment check.
        let encrypted = encrypt_bytes(b"secret", b"key-a").unwrap();
        let mut cipher: Cipher = ciborium::from_reader(encrypted.as_slice()).unwrap();

        let other_key = stretch(b"key-b");
        let mac = &cipher.ciphertext[cipher.ciphertext.len() - MAC_BYTES..];
        cipher.commitment = commitment_tag(&other_key, &cipher.nonce, mac);

        let mut buf = Vec::new();
        ciborium::into_writer(&cipher, &mut buf).unwrap();

        assert!(decrypt_bytes(&buf, b"key-a").is_err());
        assert!(decrypt_bytes(&buf, b"key-b").is_err());
    }

    #[test]
    fn test_stretch_deterministic() {
        let k1 = stretch(b"password");
        let k2 = stretch(b"password");
        assert_eq!(k1.as_bytes(), k2.as_bytes());

        let k3 = stretch(b"other");
        assert_ne!(k1.as_bytes(), k3.as_bytes());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn roundtrip_any_payload(
                payload in prop::collection::vec(any::<u8>(), 0..512),
                password in prop::collection::vec(any::<u8>(), 1..64),
            ) {
                let encrypted = encrypt_bytes(&payload, &password).unwrap();
                let decrypted = decrypt_bytes(&encrypted, &password).unwrap();
                prop_assert_eq!(decrypted, payload);
            }

            #[test]
            fn wrong_password_never_decrypts(
                payload in prop::collection::vec(any::<u8>(), 0..256),
                password in prop::collection::vec(any::<u8>(), 1..64),
                wrong in prop::collection::vec(any::<u8>(), 1..64),
            ) {
                prop_assume!(password != wrong);
                let encrypted = encrypt_bytes(&payload, &password).unwrap();
                prop_assert!(decrypt_bytes(&encrypted, &wrong).is_err());
            }
        }
    }
}
