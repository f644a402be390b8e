use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::disk::{self, SealedFile};
use super::{Bucket, EnclaveError, display_key};
use crate::cipher::{SealBackend, SoftwareBackend};

/// An open sealed box.
///
/// The file on disk is authoritative. Every write re-reads it under the
/// exclusive advisory lock and merges into it, so several handles on the
/// same path (in this process or another) never drop each other's
/// records. Reads refresh the cached copy first. Every `put` rewrites the
/// file before returning.
pub struct Enclave {
    path: PathBuf,
    backend: Box<dyn SealBackend>,
    state: Mutex<Option<SealedFile>>,
}

impl std::fmt::Debug for Enclave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enclave")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Enclave {
    /// Open the sealed box at `path`, creating an empty one if absent.
    pub fn open(path: impl Into<PathBuf>, backend: impl SealBackend + 'static) -> Result<Self, EnclaveError> {
        let path = path.into();
        let file = match disk::read_sealed_file(&path)? {
            Some(file) => file,
            None => {
                // Another opener may win the race; merging keeps its file
                let file = disk::update_sealed_file(&path, |_| {})?;
                tracing::info!(path = %path.display(), "Created sealed box");
                file
            }
        };
        let records: usize = file.buckets.values().map(|b| b.len()).sum();
        tracing::info!(path = %path.display(), records, "Enclave opened");
        Ok(Self {
            path,
            backend: Box::new(backend),
            state: Mutex::new(Some(file)),
        })
    }

    /// Open with the software backend and a hex-encoded 32-byte key.
    pub fn open_with_hex_key(path: impl Into<PathBuf>, hex_key: &str) -> Result<Self, EnclaveError> {
        let backend = SoftwareBackend::from_hex(hex_key)
            .map_err(|e| EnclaveError::Storage(format!("malformed cipher key: {e}")))?;
        Self::open(path, backend)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Digest, encrypt and store `record`, replacing any previous value.
    pub fn put(&self, bucket: Bucket, lookup_key: &[u8], record: &[u8]) -> Result<(), EnclaveError> {
        self.put_all(&[(bucket, lookup_key, record)])
    }

    /// Store several records in one atomic file update: either all of them
    /// are persisted or none is.
    pub fn put_all(&self, records: &[(Bucket, &[u8], &[u8])]) -> Result<(), EnclaveError> {
        let mut sealed = Vec::with_capacity(records.len());
        for (bucket, lookup_key, record) in records {
            let digest = hex::encode(self.backend.digest(lookup_key));
            sealed.push((*bucket, digest, self.backend.encrypt(record)?));
        }

        let mut guard = self.lock_state()?;
        if guard.is_none() {
            return Err(EnclaveError::Closed);
        }
        let written = disk::update_sealed_file(&self.path, |file| {
            for (bucket, digest, value) in sealed {
                file.buckets
                    .entry(bucket.label())
                    .or_default()
                    .insert(digest, value);
            }
        })?;
        *guard = Some(written);

        for (bucket, _, _) in records {
            tracing::debug!(%bucket, "Record stored");
        }
        Ok(())
    }

    /// Fetch and decrypt the record for `lookup_key`; `Ok(None)` if absent.
    pub fn get(&self, bucket: Bucket, lookup_key: &[u8]) -> Result<Option<Vec<u8>>, EnclaveError> {
        let digest = hex::encode(self.backend.digest(lookup_key));

        let guard = self.refreshed_state()?;
        let file = guard.as_ref().ok_or(EnclaveError::Closed)?;
        let Some(sealed) = file
            .buckets
            .get(&bucket.label())
            .and_then(|b| b.get(&digest))
        else {
            return Ok(None);
        };
        let record = self.backend.decrypt(sealed).inspect_err(|e| {
            tracing::warn!(%bucket, error = %e, "Stored record failed to decrypt");
        })?;
        Ok(Some(record))
    }

    /// Like [`Enclave::get`], for callers where absence is an error.
    pub fn get_existing(&self, bucket: Bucket, lookup_key: &[u8]) -> Result<Vec<u8>, EnclaveError> {
        self.get(bucket, lookup_key)?
            .ok_or_else(|| EnclaveError::NotFound {
                bucket,
                key: display_key(lookup_key),
            })
    }

    /// Number of records in `bucket`.
    pub fn record_count(&self, bucket: Bucket) -> Result<usize, EnclaveError> {
        let guard = self.refreshed_state()?;
        let file = guard.as_ref().ok_or(EnclaveError::Closed)?;
        Ok(file.buckets.get(&bucket.label()).map_or(0, |b| b.len()))
    }

    /// Close the enclave. Further operations fail with [`EnclaveError::Closed`].
    pub fn close(&self) {
        if let Ok(mut guard) = self.state.lock() {
            if guard.take().is_some() {
                tracing::info!(path = %self.path.display(), "Enclave closed");
            }
        }
    }

    /// Close the enclave and destroy its backing file. Safe to repeat.
    pub fn wipe(&self) -> Result<(), EnclaveError> {
        self.close();
        Self::destroy(&self.path)
    }

    /// Destroy the sealed box at `path` without opening it.
    pub fn destroy(path: &Path) -> Result<(), EnclaveError> {
        if disk::remove_sealed_file(path)? {
            tracing::info!(path = %path.display(), "Sealed box wiped");
        }
        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, Option<SealedFile>>, EnclaveError> {
        self.state
            .lock()
            .map_err(|_| EnclaveError::Storage("enclave lock poisoned".into()))
    }

    /// State guard with the cached file replaced by what is on disk now.
    /// A file removed by another wipe reads as empty.
    fn refreshed_state(&self) -> Result<MutexGuard<'_, Option<SealedFile>>, EnclaveError> {
        let mut guard = self.lock_state()?;
        if guard.is_none() {
            return Err(EnclaveError::Closed);
        }
        *guard = Some(disk::read_sealed_file(&self.path)?.unwrap_or_default());
        Ok(guard)
    }
}
