use std::path::Path;

use crate::cipher::SoftwareBackend;
use crate::config::{CeremonyConfig, Command, Config};

pub fn check(cfg: &Config) -> anyhow::Result<()> {
    let errors = collect(cfg);
    if errors.is_empty() {
        return Ok(());
    }

    for err in &errors {
        eprintln!("ERROR: {err}");
    }
    anyhow::bail!("{} preflight check(s) failed", errors.len());
}

fn collect(cfg: &Config) -> Vec<String> {
    let mut errors: Vec<String> = Vec::new();
    if cfg.command == Command::Wipe {
        return errors;
    }

    // Check 1: cipher key present and well-formed
    match cfg.key.as_deref() {
        None => errors.push(
            "no enclave key given\n  \
             → pass --key <64 hex chars> or set FIDOVAULT_KEY"
                .to_string(),
        ),
        Some(key) => {
            if let Err(e) = SoftwareBackend::from_hex(key) {
                errors.push(format!(
                    "enclave key rejected: {e}\n  \
                     → generate one with: openssl rand -hex 32"
                ));
            }
        }
    }

    // Check 2: origin and AAGUID usable
    match cfg.origin.as_deref() {
        None => errors.push(
            "no relying party origin given\n  \
             → pass --origin https://example.com"
                .to_string(),
        ),
        Some(origin) => {
            if let Err(e) = CeremonyConfig::new(&cfg.aaguid, origin, cfg.counter) {
                errors.push(e.to_string());
            }
        }
    }

    // Check 3: enclave directory writable
    match cfg.enclave_path() {
        Ok(path) => {
            if let Some(e) = parent_not_writable(&path) {
                errors.push(format!(
                    "cannot write enclave at {}: {e}\n  \
                     → pass --enclave <path> to use another location",
                    path.display()
                ));
            }
        }
        Err(e) => errors.push(e.to_string()),
    }

    errors
}

/// Create and remove a scratch file in the nearest existing ancestor of
/// `path`'s directory. Nothing is left behind and no directory is created.
fn parent_not_writable(path: &Path) -> Option<std::io::Error> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty())?;
    let existing = parent.ancestors().find(|p| p.exists())?;

    let scratch = existing.join(format!(".fidovault-preflight-{}", std::process::id()));
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&scratch)
    {
        Ok(_) => std::fs::remove_file(&scratch).err(),
        Err(e) => Some(e),
    }
}
