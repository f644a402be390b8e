use std::path::PathBuf;

use url::Url;
use uuid::Uuid;

use crate::ceremony::CeremonyError;

pub const DEFAULT_AAGUID: &str = "12c85a48-4baf-47bd-b51f-f192871a1511";
pub const ENCLAVE_FILE_NAME: &str = "enclave.bin";

#[derive(clap::Parser, Debug, Clone)]
#[command(name = "fidovault", version, about = "Software WebAuthn authenticator")]
pub struct Config {
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Sealed box location (default: XDG data dir).
    #[arg(long)]
    pub enclave: Option<PathBuf>,
    /// Enclave cipher key, 64 hex characters.
    #[arg(long, env = "FIDOVAULT_KEY", hide_env_values = true)]
    pub key: Option<String>,
    #[arg(long, default_value = DEFAULT_AAGUID)]
    pub aaguid: String,
    /// Relying party origin, e.g. https://example.com
    #[arg(long)]
    pub origin: Option<String>,
    /// Signature counter reported in authenticator data.
    #[arg(long, default_value_t = 0)]
    pub counter: u32,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read credential creation options JSON, print the attestation response.
    Register {
        /// Input file, or `-` for stdin.
        #[arg(default_value = "-")]
        input: String,
    },
    /// Read credential assertion options JSON, print the assertion response.
    Login {
        #[arg(default_value = "-")]
        input: String,
    },
    /// Delete the sealed box and everything in it, then exit.
    Wipe,
}

impl Config {
    pub fn enclave_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.enclave {
            return Ok(path.clone());
        }
        let data_dir = directories::ProjectDirs::from("", "", "fidovault")
            .ok_or_else(|| anyhow::anyhow!("cannot determine XDG data dir"))?
            .data_dir()
            .to_path_buf();
        Ok(data_dir.join(ENCLAVE_FILE_NAME))
    }

    pub fn ceremony(&self) -> Result<CeremonyConfig, CeremonyError> {
        let origin = self
            .origin
            .as_deref()
            .ok_or_else(|| CeremonyError::Validation("origin needed".into()))?;
        CeremonyConfig::new(&self.aaguid, origin, self.counter)
    }
}

/// Authenticator identity and state a ceremony reads. Passed explicitly to
/// every ceremony and never mutated by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CeremonyConfig {
    pub aaguid: Uuid,
    pub origin: Url,
    pub counter: u32,
}

impl CeremonyConfig {
    pub fn new(aaguid: &str, origin: &str, counter: u32) -> Result<Self, CeremonyError> {
        let aaguid = Uuid::parse_str(aaguid)
            .map_err(|e| CeremonyError::Validation(format!("invalid AAGUID '{aaguid}': {e}")))?;
        let origin = Url::parse(origin)
            .map_err(|e| CeremonyError::Validation(format!("invalid origin '{origin}': {e}")))?;
        Ok(Self {
            aaguid,
            origin,
            counter,
        })
    }

    pub fn with_counter(mut self, counter: u32) -> Self {
        self.counter = counter;
        self
    }
}
