use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{EnclaveError, decode_record, encode_record};

pub(crate) const FILE_VERSION: u8 = 1;

/// On-disk container: `bucket (hex) -> digest (hex) -> sealed value`.
///
/// The container itself is plain CBOR; only the values are encrypted and
/// the map keys are already digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SealedFile {
    pub version: u8,
    pub buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

impl Default for SealedFile {
    fn default() -> Self {
        Self {
            version: FILE_VERSION,
            buckets: BTreeMap::new(),
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn open_lock(path: &Path) -> Result<fd_lock::RwLock<std::fs::File>, EnclaveError> {
    let lock_path = sibling(path, "lock");
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| EnclaveError::io("lock", &lock_path, e))?;
    Ok(fd_lock::RwLock::new(file))
}

/// Read and parse the sealed file. `Ok(None)` if it does not exist yet.
pub(crate) fn read_sealed_file(path: &Path) -> Result<Option<SealedFile>, EnclaveError> {
    let lock = open_lock(path)?;
    let _guard = lock
        .read()
        .map_err(|e| EnclaveError::io("lock", path, e))?;
    load(path)
}

/// Read-modify-write under one exclusive lock: the current file (or an
/// empty one) is re-read from disk, passed to `apply`, and written back.
/// Returns the file as written.
pub(crate) fn update_sealed_file(
    path: &Path,
    apply: impl FnOnce(&mut SealedFile),
) -> Result<SealedFile, EnclaveError> {
    let mut lock = open_lock(path)?;
    let _guard = lock
        .write()
        .map_err(|e| EnclaveError::io("lock", path, e))?;

    let mut file = load(path)?.unwrap_or_default();
    apply(&mut file);
    replace(path, &file)?;
    Ok(file)
}

fn load(path: &Path) -> Result<Option<SealedFile>, EnclaveError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(EnclaveError::io("read", path, e)),
    };
    let file: SealedFile = decode_record(&bytes).map_err(|e| {
        EnclaveError::Storage(format!("corrupt sealed file {}: {e}", path.display()))
    })?;
    if file.version != FILE_VERSION {
        return Err(EnclaveError::Storage(format!(
            "unsupported sealed file version {}",
            file.version
        )));
    }
    Ok(Some(file))
}

/// Write a sibling, then rename over the sealed file. Caller holds the write lock.
fn replace(path: &Path, file: &SealedFile) -> Result<(), EnclaveError> {
    let bytes = encode_record(file)?;
    let tmp = sibling(path, "tmp");
    std::fs::write(&tmp, &bytes).map_err(|e| EnclaveError::io("write", &tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| EnclaveError::io("rename", path, e))?;
    Ok(())
}

/// Delete the sealed file and its lock/temp siblings. Missing files are not
/// an error. Returns whether the sealed file itself existed.
pub(crate) fn remove_sealed_file(path: &Path) -> Result<bool, EnclaveError> {
    let mut existed = false;
    for (i, target) in [path.to_path_buf(), sibling(path, "tmp"), sibling(path, "lock")]
        .iter()
        .enumerate()
    {
        match std::fs::remove_file(target) {
            Ok(()) => existed |= i == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(EnclaveError::io("remove", target, e)),
        }
    }
    Ok(existed)
}
