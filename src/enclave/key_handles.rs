use serde::{Deserialize, Serialize};

use super::{Bucket, Enclave, EnclaveError, UserRecord, decode_record, encode_record};
use crate::key::{KeyHandle, KeyStore, SoftKeyHandle};

/// Sealed form of a [`SoftKeyHandle`] in [`Bucket::KEY_HANDLES`], keyed by
/// credential ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    pub version: u8,
    pub credential_id: Vec<u8>,
    pub private_key: Vec<u8>, // P-256 scalar, 32 bytes
    pub created_at: u64,
}

impl KeyStore for Enclave {
    type Handle = SoftKeyHandle;

    fn new_key_handle(&self) -> Result<SoftKeyHandle, EnclaveError> {
        if !self.is_open() {
            return Err(EnclaveError::Closed);
        }
        Ok(SoftKeyHandle::generate())
    }

    fn key_handle(&self, credential_id: &[u8]) -> Result<Option<SoftKeyHandle>, EnclaveError> {
        let Some(bytes) = self.get(Bucket::KEY_HANDLES, credential_id)? else {
            return Ok(None);
        };
        let record: KeyRecord = decode_record(&bytes)?;
        if record.credential_id != credential_id {
            return Err(EnclaveError::Storage(format!(
                "key record mismatch for credential {}",
                hex::encode(credential_id)
            )));
        }
        let handle = SoftKeyHandle::from_secret(record.credential_id, &record.private_key)?;
        Ok(Some(handle))
    }

    fn store_credential(
        &self,
        handle: &SoftKeyHandle,
        user: Option<(&str, &[u8])>,
    ) -> Result<(), EnclaveError> {
        let record = KeyRecord {
            version: 1,
            credential_id: handle.id().to_vec(),
            private_key: handle.secret_bytes(),
            created_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };
        let key_bytes = encode_record(&record)?;
        let user_entry = match user {
            Some((name, user_handle)) => {
                let user = UserRecord::new(name, user_handle.to_vec()).with_credential(handle.id());
                Some((name, encode_record(&user)?))
            }
            None => None,
        };

        let mut records = vec![(Bucket::KEY_HANDLES, handle.id(), key_bytes.as_slice())];
        if let Some((name, bytes)) = &user_entry {
            records.push((Bucket::USERS, name.as_bytes(), bytes.as_slice()));
        }
        self.put_all(&records)?;

        tracing::info!(
            cred_id = %hex::encode(handle.id()),
            user = user.map(|(name, _)| name),
            "Key handle stored"
        );
        Ok(())
    }
}
