pub mod cose;
pub mod soft;

pub use soft::SoftKeyHandle;

use crate::cipher::CryptoError;
use crate::enclave::EnclaveError;

/// Length of freshly generated credential IDs.
pub const CREDENTIAL_ID_LEN: usize = 32;

/// One credential's key pair. The private half is only ever used through
/// [`KeyHandle::sign`].
pub trait KeyHandle: Send + Sync {
    /// Credential ID, fixed at creation.
    fn id(&self) -> &[u8];

    /// Public key as a CBOR-encoded COSE_Key matching the signing algorithm.
    fn cbor_public_key(&self) -> Result<Vec<u8>, CryptoError>;

    /// DER-encoded ECDSA signature over `data`.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Where ceremonies create and resolve key handles.
pub trait KeyStore: Send + Sync {
    type Handle: KeyHandle;

    /// Generate a new key pair with a fresh credential ID. Nothing is
    /// persisted until [`KeyStore::store_credential`].
    fn new_key_handle(&self) -> Result<Self::Handle, EnclaveError>;

    /// Resolve a handle from a credential ID presented by a relying party.
    fn key_handle(&self, credential_id: &[u8]) -> Result<Option<Self::Handle>, EnclaveError>;

    fn is_owned(&self, credential_id: &[u8]) -> Result<bool, EnclaveError> {
        Ok(self.key_handle(credential_id)?.is_some())
    }

    /// Persist `handle` and, when given, link it to the user
    /// `(name, user_handle)`. Both are stored or neither is.
    fn store_credential(&self, handle: &Self::Handle, user: Option<(&str, &[u8])>) -> Result<(), EnclaveError>;
}
