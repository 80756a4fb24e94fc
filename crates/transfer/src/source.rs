use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::TransferError;

/// Sequential reader over a whole source.
pub type SourceReader = Box<dyn AsyncRead + Send + Unpin>;

/// Read-only bytes of a known length, readable from the start or by range.
///
/// The source must not change while an upload is running; the digest and
/// the part slices are taken from separate reads.
pub trait ContentSource: Send + Sync {
    /// Total length in bytes.
    fn size(&self) -> u64;

    /// Opens a reader positioned at byte 0.
    fn reader(&self) -> Pin<Box<dyn Future<Output = Result<SourceReader, TransferError>> + Send + '_>>;

    /// Reads `[start, end)`.
    fn read_range(
        &self,
        start: u64,
        end: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send + '_>>;
}

fn check_range(start: u64, end: u64, size: u64) -> Result<usize, TransferError> {
    if start > end || end > size {
        return Err(TransferError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("range {start}..{end} outside source of {size} bytes"),
        )));
    }
    usize::try_from(end - start).map_err(|_| {
        TransferError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "range too large for memory",
        ))
    })
}

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// A file on disk. Each read opens its own handle so parts can be read
/// concurrently.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    size: u64,
}

impl FileSource {
    /// Stats `path` and records its size.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref().to_path_buf();
        let meta = tokio::fs::metadata(&path).await?;
        if !meta.is_file() {
            return Err(TransferError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            )));
        }
        Ok(Self {
            path,
            size: meta.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContentSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn reader(&self) -> Pin<Box<dyn Future<Output = Result<SourceReader, TransferError>> + Send + '_>> {
        Box::pin(async move {
            let file = tokio::fs::File::open(&self.path).await?;
            Ok(Box::new(file) as SourceReader)
        })
    }

    fn read_range(
        &self,
        start: u64,
        end: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send + '_>> {
        Box::pin(async move {
            let len = check_range(start, end, self.size)?;
            let mut file = tokio::fs::File::open(&self.path).await?;
            file.seek(SeekFrom::Start(start)).await?;
            let mut buf = vec![0u8; len];
            file.read_exact(&mut buf).await?;
            Ok(buf)
        })
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Bytes already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }
}

impl ContentSource for MemorySource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn reader(&self) -> Pin<Box<dyn Future<Output = Result<SourceReader, TransferError>> + Send + '_>> {
        let cursor = io::Cursor::new(Arc::clone(&self.data));
        Box::pin(async move { Ok(Box::new(cursor) as SourceReader) })
    }

    fn read_range(
        &self,
        start: u64,
        end: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send + '_>> {
        Box::pin(async move {
            let len = check_range(start, end, self.size())?;
            // check_range bounds `start` by the in-memory length.
            let start = start as usize;
            Ok(self.data[start..start + len].to_vec())
        })
    }
}
