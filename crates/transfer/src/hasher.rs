use std::time::Duration;

use oseh_protocol::ContentDigest;
use sha2::{Digest, Sha512};
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::source::ContentSource;
use crate::{DEFAULT_HASH_STEP, DEFAULT_READ_SIZE, TransferError};

/// Receives the cumulative number of bytes hashed so far.
pub type ProgressSink<'a> = &'a (dyn Fn(u64) + Send + Sync);

/// Tuning for [`compute_sha512`].
#[derive(Debug, Clone)]
pub struct HashConfig {
    /// Bytes requested per read from the source.
    pub read_size: usize,
    /// Reads larger than this are fed to the hash function in pieces.
    pub step_size: usize,
    /// Longest stretch of hashing before handing control back to the runtime.
    pub yield_budget: Duration,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            read_size: DEFAULT_READ_SIZE,
            step_size: DEFAULT_HASH_STEP,
            yield_budget: Duration::from_millis(100),
        }
    }
}

/// Streams `source` through SHA-512.
///
/// Large files are hashed in `step_size` pieces, yielding to the runtime
/// whenever more than `yield_budget` has passed since the last yield, so
/// other tasks on the same thread keep running. The result does not depend
/// on `read_size` or `step_size`.
pub async fn compute_sha512(
    source: &dyn ContentSource,
    config: &HashConfig,
    cancel: &CancellationToken,
    on_progress: Option<ProgressSink<'_>>,
) -> Result<ContentDigest, TransferError> {
    let started = Instant::now();
    let mut reader = source.reader().await?;
    let mut hasher = Sha512::new();
    let mut buf = vec![0u8; config.read_size.max(1)];
    let step = config.step_size.max(1);
    let mut hashed: u64 = 0;
    let mut last_yield = Instant::now();

    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            read = reader.read(&mut buf) => read?,
        };
        if n == 0 {
            break;
        }

        for piece in buf[..n].chunks(step) {
            hasher.update(piece);
            hashed += piece.len() as u64;
            if let Some(sink) = on_progress {
                sink(hashed);
            }

            if last_yield.elapsed() >= config.yield_budget {
                tokio::task::yield_now().await;
                last_yield = Instant::now();
                if cancel.is_cancelled() {
                    return Err(TransferError::Cancelled);
                }
            }
        }
    }

    let digest = ContentDigest::from_digest_bytes(&hasher.finalize())?;
    debug!(
        bytes = hashed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "hashed content"
    );
    Ok(digest)
}
