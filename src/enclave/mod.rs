//! Sealed, bucketed key-value storage for authenticator secrets.
//!
//! Every value is encrypted by the configured [`SealBackend`] and stored
//! under the digest of its lookup key, so the backing file never contains
//! user names or credential IDs in plaintext.
//!
//! [`SealBackend`]: crate::cipher::SealBackend

pub mod disk;
pub mod key_handles;
pub mod store;
pub mod user;

use std::path::PathBuf;

pub use key_handles::KeyRecord;
pub use store::Enclave;
pub use user::UserRecord;

use crate::cipher::CryptoError;

/// Independent namespace inside the enclave. Identical lookup keys in
/// different buckets never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket(pub [u8; 2]);

impl Bucket {
    pub const USERS: Bucket = Bucket([0x01, 0x01]);
    pub const KEY_HANDLES: Bucket = Bucket([0x01, 0x02]);

    pub(crate) fn label(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Bucket::USERS => f.write_str("users"),
            Bucket::KEY_HANDLES => f.write_str("key-handles"),
            Bucket(id) => write!(f, "{}", hex::encode(id)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnclaveError {
    #[error("I/O ({op} {}): {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage: {0}")]
    Storage(String),
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),
    #[error("serialize: {0}")]
    Serialization(String),
    #[error("{key} not found in bucket {bucket}")]
    NotFound { bucket: Bucket, key: String },
    #[error("enclave is closed")]
    Closed,
}

impl EnclaveError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EnclaveError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Human-readable form of a lookup key for error context: text as-is,
/// binary identifiers as hex.
pub(crate) fn display_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(s) if !s.chars().any(char::is_control) => s.to_string(),
        _ => hex::encode(key),
    }
}

pub(crate) fn encode_record<T: serde::Serialize>(record: &T) -> Result<Vec<u8>, EnclaveError> {
    let mut buf = Vec::new();
    ciborium::into_writer(record, &mut buf)
        .map_err(|e| EnclaveError::Serialization(e.to_string()))?;
    Ok(buf)
}

pub(crate) fn decode_record<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, EnclaveError> {
    ciborium::from_reader(bytes).map_err(|e| EnclaveError::Serialization(e.to_string()))
}
