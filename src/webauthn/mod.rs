pub mod attestation;
pub mod authenticator_data;
pub mod base64url;
pub mod client_data;
pub mod types;

pub use authenticator_data::{AttestedCredentialData, AuthenticatorData, Flags, rp_id_hash};
pub use client_data::{CeremonyType, CollectedClientData};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cbor: {0}")]
    Cbor(String),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("layout: {0}")]
    Layout(String),
    #[error("origin: {0}")]
    Origin(String),
}
