#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Enclave: {0}")]
    Enclave(#[from] crate::enclave::EnclaveError),
    #[error("Crypto: {0}")]
    Crypto(#[from] crate::cipher::CryptoError),
    #[error("Ceremony: {0}")]
    Ceremony(#[from] crate::ceremony::CeremonyError),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
