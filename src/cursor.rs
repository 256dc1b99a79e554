//! Incremental file reading with offset tracking.

use crate::error::{Error, Result};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, trace};

/// An open read handle plus the bookkeeping needed to read only what was
/// appended since the last call.
///
/// `offset <= last_len` holds after every successful read.
#[derive(Debug)]
pub struct FileCursor {
    path: PathBuf,
    file: Option<File>,
    last_len: u64,
    offset: u64,
}

/// Result of an incremental read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// The file shrank or the handle went backwards; `text` is the whole file.
    pub did_reset: bool,
}

impl FileCursor {
    /// Opens `path` and reads its entire current content.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<(String, FileCursor)> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .map_err(|e| Error::open(&path, e))?;

        let mut cursor = FileCursor {
            path,
            file: Some(file),
            last_len: 0,
            offset: 0,
        };
        let text = cursor.read_full().await?;

        debug!(
            "Opened {} at offset {}",
            cursor.path.display(),
            cursor.offset
        );
        Ok((text, cursor))
    }

    /// Reads whatever is new since the last read.
    pub async fn read_incremental(&mut self) -> Result<Chunk> {
        let last_offset = self.offset;
        let file = self.handle()?;
        let current_len = file.metadata().await?.len();
        let position = file.stream_position().await?;

        let did_reset = needs_reset(current_len, position, last_offset);
        let start = if did_reset {
            debug!(
                "{} shrank to {} bytes (offset was {}), reloading",
                self.path.display(),
                current_len,
                last_offset
            );
            0
        } else {
            last_offset
        };

        let text = self.read_from(start, current_len).await?;
        Ok(Chunk { text, did_reset })
    }

    /// Re-reads the file from byte 0.
    pub async fn read_full(&mut self) -> Result<String> {
        let current_len = self.current_len().await?;
        self.read_from(0, current_len).await
    }

    /// Length of the file behind the open handle.
    pub async fn current_len(&self) -> Result<u64> {
        match &self.file {
            Some(file) => Ok(file.metadata().await?.len()),
            None => Err(closed_handle_error()),
        }
    }

    /// Releases the handle. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            trace!("Closed handle for {}", self.path.display());
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length seen at the last read.
    pub fn last_len(&self) -> u64 {
        self.last_len
    }

    fn handle(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or_else(closed_handle_error)
    }

    /// Reads from `start` to end of file and moves the offset past the
    /// last complete character.
    async fn read_from(&mut self, start: u64, observed_len: u64) -> Result<String> {
        let file = self.handle()?;
        file.seek(SeekFrom::Start(start)).await?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await?;

        let (text, consumed) = decode_complete(&bytes);
        let offset = start + consumed as u64;
        if consumed < bytes.len() {
            file.seek(SeekFrom::Start(offset)).await?;
        }

        // A writer may have appended between the stat and the read.
        self.last_len = observed_len.max(start + bytes.len() as u64);
        self.offset = offset;
        Ok(text)
    }
}

fn closed_handle_error() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "file handle is closed",
    ))
}

/// The file was truncated or replaced if it is now shorter than what we
/// already consumed, or if the handle position went backwards.
fn needs_reset(current_len: u64, position: u64, last_offset: u64) -> bool {
    current_len < last_offset || position < last_offset
}

/// Decodes bytes as UTF-8, leaving an incomplete trailing character unread.
///
/// Returns the text and how many bytes it covers. Invalid sequences elsewhere
/// are replaced with U+FFFD.
fn decode_complete(bytes: &[u8]) -> (String, usize) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), bytes.len()),
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            (String::from_utf8_lossy(&bytes[..valid]).into_owned(), valid)
        }
        Err(_) => {
            let consumed = bytes.len() - incomplete_tail_len(bytes);
            (
                String::from_utf8_lossy(&bytes[..consumed]).into_owned(),
                consumed,
            )
        }
    }
}

/// Length of a truncated multi-byte sequence at the very end of `bytes`.
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let window = bytes.len().min(3);
    for back in 1..=window {
        let lead = bytes[bytes.len() - back];
        if lead & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let width = match lead {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return 0,
        };
        return if width > back { back } else { 0 };
    }
    0
}
