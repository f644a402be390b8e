//! Registration and assertion ceremonies.
//!
//! Each ceremony is a function of the key store, the request and a
//! [`CeremonyConfig`](crate::config::CeremonyConfig); nothing is shared
//! between invocations except what the store persists.

pub mod login;
pub mod register;
pub mod stream;

pub use login::{build_assertion_response, login};
pub use register::{build_creation_response, register};
pub use stream::{ResponseStream, login_stream, register_stream};

use crate::cipher::CryptoError;
use crate::enclave::EnclaveError;
use crate::webauthn::CodecError;
use crate::webauthn::client_data::client_data_hash;

/// Coarse classification of a [`CeremonyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Crypto,
    Storage,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CeremonyError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("malformed request JSON: {0}")]
    Request(#[source] serde_json::Error),
    #[error("reading request: {0}")]
    Input(#[source] std::io::Error),
    #[error("authenticator not found")]
    AuthenticatorNotFound,
    #[error("credential {0} is already registered with this authenticator")]
    CredentialExcluded(String),
    #[error("enclave: {0}")]
    Enclave(#[from] EnclaveError),
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),
    #[error("codec: {0}")]
    Codec(#[from] CodecError),
    #[error("internal: {0}")]
    Internal(String),
}

impl CeremonyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Request(_) | Self::Input(_) | Self::CredentialExcluded(_) => {
                ErrorKind::Validation
            }
            Self::Codec(CodecError::Origin(_)) => ErrorKind::Validation,
            Self::AuthenticatorNotFound => ErrorKind::NotFound,
            Self::Enclave(EnclaveError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Enclave(EnclaveError::Crypto(_)) | Self::Crypto(_) => ErrorKind::Crypto,
            Self::Enclave(_) => ErrorKind::Storage,
            Self::Codec(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// `authenticatorData || SHA-256(clientDataJSON)`
pub(crate) fn signed_payload(auth_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(auth_data.len() + 32);
    payload.extend_from_slice(auth_data);
    payload.extend_from_slice(&client_data_hash(client_data_json));
    payload
}

pub(crate) fn encode_response<T: serde::Serialize>(response: &T) -> Result<Vec<u8>, CeremonyError> {
    serde_json::to_vec(response).map_err(|e| CeremonyError::Internal(format!("encode response: {e}")))
}
