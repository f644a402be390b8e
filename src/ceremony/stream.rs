use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use super::{CeremonyError, build_assertion_response, build_creation_response};
use crate::config::CeremonyConfig;
use crate::key::KeyStore;
use crate::webauthn::types::{CredentialAssertion, CredentialCreation};

/// Bytes buffered before a chunk is handed to the consumer.
pub const CHUNK_SIZE: usize = 4096;
const STREAM_DEPTH: usize = 8;

type Chunk = Result<Vec<u8>, CeremonyError>;

/// Response JSON produced concurrently with its consumption.
///
/// Yields `Ok` chunks as the producer serializes. A failed ceremony ends
/// the stream with exactly one `Err`; the stream then closes.
#[derive(Debug)]
pub struct ResponseStream {
    rx: mpsc::Receiver<Chunk>,
}

impl ResponseStream {
    /// Next chunk, or `None` once the producer has finished.
    pub async fn next_chunk(&mut self) -> Option<Chunk> {
        self.rx.recv().await
    }

    /// Drain the stream into one buffer, failing with the producer's error.
    pub async fn collect(mut self) -> Result<Vec<u8>, CeremonyError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.rx.recv().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

/// `std::io::Write` end of the pipe, used from the blocking producer.
struct ChannelWriter {
    tx: mpsc::Sender<Chunk>,
    buf: Vec<u8>,
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= CHUNK_SIZE {
            self.flush()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buf, Vec::with_capacity(CHUNK_SIZE));
        self.tx.blocking_send(Ok(chunk)).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "response consumer dropped")
        })
    }
}

/// Run registration on a background task. Must be called within a tokio
/// runtime.
pub fn register_stream<S, R>(store: Arc<S>, cfg: CeremonyConfig, input: R) -> ResponseStream
where
    S: KeyStore + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    spawn_producer("register", input, move |body| {
        let creation: CredentialCreation =
            serde_json::from_slice(body).map_err(CeremonyError::Request)?;
        build_creation_response(store.as_ref(), &cfg, &creation)
    })
}

/// Run assertion on a background task. Must be called within a tokio
/// runtime.
pub fn login_stream<S, R>(store: Arc<S>, cfg: CeremonyConfig, input: R) -> ResponseStream
where
    S: KeyStore + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    spawn_producer("login", input, move |body| {
        let assertion: CredentialAssertion =
            serde_json::from_slice(body).map_err(CeremonyError::Request)?;
        build_assertion_response(store.as_ref(), &cfg, &assertion)
    })
}

fn spawn_producer<R, T, F>(ceremony: &'static str, mut input: R, build: F) -> ResponseStream
where
    R: AsyncRead + Unpin + Send + 'static,
    T: Serialize,
    F: FnOnce(&[u8]) -> Result<T, CeremonyError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Chunk>(STREAM_DEPTH);

    tokio::spawn(async move {
        let mut body = Vec::new();
        let result = match input.read_to_end(&mut body).await {
            Err(e) => Err(CeremonyError::Input(e)),
            Ok(_) => {
                let writer_tx = tx.clone();
                // Key generation, sealing and signing block; keep them off the runtime.
                tokio::task::spawn_blocking(move || {
                    let response = build(&body)?;
                    let mut writer = ChannelWriter {
                        tx: writer_tx,
                        buf: Vec::with_capacity(CHUNK_SIZE),
                    };
                    serde_json::to_writer(&mut writer, &response)
                        .and_then(|()| writer.flush().map_err(serde_json::Error::io))
                        .map_err(|e| CeremonyError::Internal(format!("encode response: {e}")))
                })
                .await
                .unwrap_or_else(|e| {
                    Err(CeremonyError::Internal(format!("{ceremony} producer failed: {e}")))
                })
            }
        };

        match result {
            Ok(()) => tracing::debug!(ceremony, "Response stream complete"),
            Err(e) => {
                tracing::warn!(ceremony, error = %e, "Ceremony failed");
                if tx.send(Err(e)).await.is_err() {
                    tracing::debug!(ceremony, "Consumer dropped before failure was delivered");
                }
            }
        }
    });

    ResponseStream { rx }
}
