use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::{CryptoError, KEY_LEN, SealBackend};

const NONCE_LEN: usize = 12;

/// SHA-256 lookup digests and AES-256-GCM sealing, entirely in software.
///
/// Sealed values are laid out as `nonce (12) || ciphertext+tag`.
/// The digest is unsalted; it only keeps identifiers out of the file in
/// plaintext and offers no resistance to guessing low-entropy names.
pub struct SoftwareBackend {
    cipher: Aes256Gcm,
}

impl SoftwareBackend {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {KEY_LEN}-byte key, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Parse a hex-encoded key, e.g. from `--key` or `FIDOVAULT_KEY`.
    pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
        let key = hex::decode(hex_key.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("not hex: {e}")))?;
        Self::new(&key)
    }
}

impl std::fmt::Debug for SoftwareBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareBackend").finish_non_exhaustive()
    }
}

impl SealBackend for SoftwareBackend {
    fn digest(&self, data: &[u8]) -> Vec<u8> {
        Sha256::digest(data).to_vec()
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < NONCE_LEN {
            return Err(CryptoError::Decryption("sealed value too short".into()));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CryptoError::Decryption(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX_KEY: &str = "15308490f1e4026284594dd08d31291bc8ef2aeac730d0daf6ff87bb92d4336c";

    #[test]
    fn test_from_hex_accepts_32_byte_key() {
        assert!(SoftwareBackend::from_hex(HEX_KEY).is_ok());
    }

    #[test]
    fn test_wrong_key_length_fails() {
        assert!(matches!(
            SoftwareBackend::new(&[0u8; 16]),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            SoftwareBackend::new(&[0u8; 33]),
            Err(CryptoError::InvalidKey(_))
        ));
        // 31 bytes of hex must not be padded up
        assert!(SoftwareBackend::from_hex(&HEX_KEY[..62]).is_err());
        assert!(SoftwareBackend::from_hex("zz").is_err());
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = SoftwareBackend::from_hex(HEX_KEY).unwrap();
        let b = SoftwareBackend::from_hex(HEX_KEY).unwrap();
        assert_eq!(a.digest(b"alice@example.com"), b.digest(b"alice@example.com"));
        assert_eq!(a.digest(b"x").len(), 32);
        assert_ne!(a.digest(b"x"), a.digest(b"y"));
    }

    #[test]
    fn test_seal_open() {
        let backend = SoftwareBackend::new(&[0x42u8; 32]).unwrap();
        let sealed = backend.encrypt(b"wallet key").unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + b"wallet key".len() + 16);
        assert_ne!(&sealed[NONCE_LEN..NONCE_LEN + 10], b"wallet key");
        assert_eq!(backend.decrypt(&sealed).unwrap(), b"wallet key");
    }

    #[test]
    fn test_nonce_is_fresh_per_encryption() {
        let backend = SoftwareBackend::new(&[0x42u8; 32]).unwrap();
        let a = backend.encrypt(b"same").unwrap();
        let b = backend.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_to_decrypt() {
        let a = SoftwareBackend::new(&[0x11u8; 32]).unwrap();
        let b = SoftwareBackend::new(&[0x22u8; 32]).unwrap();
        let sealed = a.encrypt(b"secret").unwrap();
        assert!(matches!(b.decrypt(&sealed), Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let backend = SoftwareBackend::new(&[0x33u8; 32]).unwrap();
        let mut sealed = backend.encrypt(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(backend.decrypt(&sealed).is_err());
        assert!(backend.decrypt(b"short").is_err());
    }
}
