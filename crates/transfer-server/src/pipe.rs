//! Chunked byte copy between an async reader and writer.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use transfer_types::CHUNK_SIZE;

/// Result of a [`pipe`] run.
#[derive(Debug)]
pub(crate) enum PipeOutcome {
    /// Source reached end-of-stream and every byte was written.
    Complete { bytes: u64 },
    /// A read or write failed; `bytes` were written before the failure.
    Interrupted { bytes: u64, error: io::Error },
}

impl PipeOutcome {
    pub(crate) fn bytes(&self) -> u64 {
        match self {
            PipeOutcome::Complete { bytes } | PipeOutcome::Interrupted { bytes, .. } => *bytes,
        }
    }
}

/// Copy `reader` into `writer` in `CHUNK_SIZE` reads until end-of-stream.
///
/// The first failed read or write stops the copy. Nothing is retried.
pub(crate) async fn pipe<R, W>(reader: &mut R, writer: &mut W) -> PipeOutcome
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut bytes = 0u64;
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return PipeOutcome::Interrupted { bytes, error },
        };
        if let Err(error) = writer.write_all(&buf[..n]).await {
            return PipeOutcome::Interrupted { bytes, error };
        }
        bytes += n as u64;
    }
    if let Err(error) = writer.flush().await {
        return PipeOutcome::Interrupted { bytes, error };
    }
    PipeOutcome::Complete { bytes }
}
