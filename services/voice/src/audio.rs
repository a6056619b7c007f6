//! Audio input for a voice turn.
//!
//! The session treats audio as opaque bytes; a source only has to hand out
//! chunks in order until it runs dry.

use anyhow::Context;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Default chunk size: 100 ms of 16 kHz mono 16-bit PCM.
pub const DEFAULT_CHUNK_SIZE: usize = 3200;

/// A producer of audio chunks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioSource: Send {
    /// Returns the next chunk, or `None` once the source is exhausted.
    async fn next_chunk(&mut self) -> anyhow::Result<Option<Bytes>>;
}

/// Reads a file in fixed-size chunks. The last chunk may be shorter.
pub struct FileAudioSource {
    file: File,
    chunk_size: usize,
}

impl FileAudioSource {
    pub async fn open(path: impl AsRef<Path>, chunk_size: usize) -> anyhow::Result<Self> {
        let path = path.as_ref();
        anyhow::ensure!(chunk_size > 0, "chunk size must be positive");
        let file = File::open(path)
            .await
            .with_context(|| format!("Failed to open audio file {}", path.display()))?;
        Ok(Self { file, chunk_size })
    }
}

#[async_trait]
impl AudioSource for FileAudioSource {
    async fn next_chunk(&mut self) -> anyhow::Result<Option<Bytes>> {
        let mut buf = BytesMut::zeroed(self.chunk_size);
        let mut filled = 0;
        while filled < self.chunk_size {
            let read = self.file.read(&mut buf[filled..]).await?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf.freeze()))
    }
}
