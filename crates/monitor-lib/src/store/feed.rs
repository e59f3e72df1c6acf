//! Incremental reader for append-only JSON-lines files

use crate::error::Result;
use serde::de::DeserializeOwned;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// JSON-lines file read from where the previous read stopped.
///
/// Only newline-terminated lines are consumed; a partially written last
/// line is picked up by the next read. A file that shrank is assumed to
/// have been rotated and is read again from the start.
#[derive(Debug)]
pub struct JsonlFeed {
    path: PathBuf,
    offset: Mutex<u64>,
}

impl JsonlFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: Mutex::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes consumed so far
    pub async fn offset(&self) -> u64 {
        *self.offset.lock().await
    }

    /// Records appended since the last read; malformed lines are skipped
    pub async fn read_new<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let mut offset = self.offset.lock().await;

        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Feed file does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata().await?.len();
        if len < *offset {
            warn!(
                path = %self.path.display(),
                offset = *offset,
                len,
                "Feed file shrank, reading from the start"
            );
            *offset = 0;
        }
        if len == *offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(*offset)).await?;
        let mut buf = Vec::with_capacity((len - *offset) as usize);
        file.read_to_end(&mut buf).await?;

        let complete = match buf.iter().rposition(|b| *b == b'\n') {
            Some(pos) => pos + 1,
            None => return Ok(Vec::new()),
        };
        let start = *offset;
        *offset += complete as u64;

        let mut records = Vec::new();
        for (idx, line) in buf[..complete].split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    from_offset = start,
                    line = idx + 1,
                    error = %e,
                    "Skipping malformed feed line"
                ),
            }
        }
        Ok(records)
    }
}
