use serde::{Deserialize, Serialize};

use super::{Bucket, Enclave, EnclaveError, decode_record, encode_record};

/// Per-user record in [`Bucket::USERS`], keyed by user name.
///
/// Always written whole; re-registration overwrites the previous record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub version: u8,
    pub name: String,
    /// Opaque payload owned by the caller (user handle, wallet key, ...).
    pub data: Vec<u8>,
    pub credentials: Vec<Vec<u8>>,
    pub created_at: u64,
}

impl UserRecord {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            version: 1,
            name: name.into(),
            data,
            credentials: Vec::new(),
            created_at,
        }
    }

    pub fn with_credential(mut self, credential_id: &[u8]) -> Self {
        self.credentials.push(credential_id.to_vec());
        self
    }
}

impl Enclave {
    pub fn put_user(&self, user: &UserRecord) -> Result<(), EnclaveError> {
        self.put(Bucket::USERS, user.name.as_bytes(), &encode_record(user)?)
    }

    pub fn get_user(&self, name: &str) -> Result<Option<UserRecord>, EnclaveError> {
        self.get(Bucket::USERS, name.as_bytes())?
            .map(|bytes| decode_record(&bytes))
            .transpose()
    }

    pub fn get_existing_user(&self, name: &str) -> Result<UserRecord, EnclaveError> {
        let bytes = self.get_existing(Bucket::USERS, name.as_bytes())?;
        decode_record(&bytes)
    }
}
