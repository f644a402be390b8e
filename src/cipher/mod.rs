pub mod software;

pub use software::SoftwareBackend;

/// Length of the symmetric key accepted by the software backend.
pub const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("encrypt: {0}")]
    Encryption(String),
    #[error("decrypt: {0}")]
    Decryption(String),
    #[error("sign: {0}")]
    Signing(String),
    #[error("key material: {0}")]
    KeyMaterial(String),
}

/// Primitives the enclave seals its records with.
///
/// Implementations must be deterministic for `digest` and authenticated for
/// `encrypt`/`decrypt`: tampered or foreign ciphertext has to fail, not
/// decrypt to garbage. A hardware-backed implementation can replace
/// [`SoftwareBackend`] without touching the enclave.
pub trait SealBackend: Send + Sync {
    /// One-way digest used for lookup keys.
    fn digest(&self, data: &[u8]) -> Vec<u8>;

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError>;
}
