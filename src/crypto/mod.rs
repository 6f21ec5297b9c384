//! Recipient address encryption.
//!
//! Recipient phone numbers and email addresses travel through the queue and the
//! database as opaque AES-256-GCM payloads: `base64(nonce || ciphertext)`. Only
//! the dispatch worker decrypts, immediately before handing the plaintext to a
//! channel provider.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

/// GCM nonce length in bytes
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid recipient key: {0}")]
    InvalidKey(String),

    #[error("Invalid recipient encoding: {0}")]
    InvalidEncoding(String),

    #[error("Recipient decryption failed")]
    DecryptionFailed,
}

/// AES-256-GCM cipher for recipient addresses.
pub struct RecipientCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for RecipientCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipientCipher").finish_non_exhaustive()
    }
}

impl RecipientCipher {
    /// Build a cipher from a base64-encoded 32-byte key.
    pub fn from_base64_key(key: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64
            .decode(key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(&bytes)
            .map_err(|_| CryptoError::InvalidKey("key must be 32 bytes".to_string()))?;
        Ok(Self { cipher })
    }

    /// Encrypt a plaintext address into the opaque wire form.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::DecryptionFailed)?;

        let mut payload = nonce.to_vec();
        payload.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(payload))
    }

    /// Decrypt an opaque recipient back to a plaintext address.
    ///
    /// Any failure here is a data-integrity failure: the job carried a recipient
    /// this deployment cannot read, and the notification is permanently failed.
    pub fn decrypt(&self, encrypted: &str) -> Result<String, CryptoError> {
        let payload = BASE64
            .decode(encrypted)
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;

        if payload.len() <= NONCE_LEN {
            return Err(CryptoError::InvalidEncoding(
                "payload shorter than nonce".to_string(),
            ));
        }

        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "anVhLWRldi1yZWNpcGllbnQta2V5LTMyLWJ5dGVzISE=";

    #[test]
    fn test_roundtrip() {
        let cipher = RecipientCipher::from_base64_key(TEST_KEY).unwrap();
        let encrypted = cipher.encrypt("+256700123456").unwrap();
        assert_ne!(encrypted, "+256700123456");
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "+256700123456");
    }

    #[test]
    fn test_invalid_key_length() {
        let err = RecipientCipher::from_base64_key("c2hvcnQ=").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)));
    }

    #[test]
    fn test_garbage_payload_rejected() {
        let cipher = RecipientCipher::from_base64_key(TEST_KEY).unwrap();
        assert!(matches!(
            cipher.decrypt("not base64!!"),
            Err(CryptoError::InvalidEncoding(_))
        ));
        assert!(matches!(
            cipher.decrypt("AAAA"),
            Err(CryptoError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let cipher = RecipientCipher::from_base64_key(TEST_KEY).unwrap();
        let encrypted = cipher.encrypt("user@example.com").unwrap();
        let mut bytes = BASE64.decode(&encrypted).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let tampered = BASE64.encode(bytes);
        assert!(matches!(
            cipher.decrypt(&tampered),
            Err(CryptoError::DecryptionFailed)
        ));
    }
}
