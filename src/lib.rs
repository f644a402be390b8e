pub mod ceremony;
pub mod cipher;
pub mod config;
pub mod diagnostics;
pub mod enclave;
pub mod error;
pub mod key;
pub mod webauthn;

pub use ceremony::{CeremonyError, ErrorKind};
pub use config::{CeremonyConfig, Command, Config};
pub use enclave::{Bucket, Enclave, EnclaveError};

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::cipher::SoftwareBackend;

pub async fn run(cfg: Config) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    let level = match cfg.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();

    // Preflight checks
    diagnostics::check(&cfg)?;

    let path = cfg.enclave_path()?;
    match &cfg.command {
        Command::Wipe => {
            Enclave::destroy(&path)?;
            eprintln!("Wiped sealed box at {}", path.display());
            Ok(())
        }
        Command::Register { input } | Command::Login { input } => {
            let ceremony_cfg = cfg.ceremony()?;
            let key = cfg
                .key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("no enclave key given"))?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let enclave = Arc::new(open_enclave(&path, key)?);
            tracing::info!(
                path = %path.display(),
                credentials = enclave.record_count(Bucket::KEY_HANDLES)?,
                "Enclave ready"
            );

            let reader = open_input(input).await?;
            let stream = match &cfg.command {
                Command::Register { .. } => {
                    ceremony::register_stream(enclave.clone(), ceremony_cfg, reader)
                }
                _ => ceremony::login_stream(enclave.clone(), ceremony_cfg, reader),
            };
            let written = pipe_to_stdout(stream).await;
            enclave.close();
            let written = written?;
            tracing::debug!(bytes = written, "Response written");
            Ok(())
        }
    }
}

fn open_enclave(path: &Path, hex_key: &str) -> error::Result<Enclave> {
    let backend = SoftwareBackend::from_hex(hex_key)?;
    Ok(Enclave::open(path, backend)?)
}

async fn open_input(input: &str) -> error::Result<Box<dyn AsyncRead + Unpin + Send>> {
    if input == "-" {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(input).await?;
    Ok(Box::new(file))
}

async fn pipe_to_stdout(mut stream: ceremony::ResponseStream) -> error::Result<usize> {
    let mut stdout = tokio::io::stdout();
    let mut written = 0usize;
    while let Some(chunk) = stream.next_chunk().await {
        let chunk = chunk?;
        stdout.write_all(&chunk).await?;
        written += chunk.len();
    }
    if written == 0 {
        return Err(error::Error::Internal("ceremony produced no response".into()));
    }
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(written)
}
