//! Durable record sinks.
//!
//! Every formatted record is appended to a [`LogSink`] on every tick,
//! regardless of the network link's state.

use crate::error::Result;
use crate::record::{Record, header_line};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Append-only destination for records
pub trait LogSink: Send {
    /// Append one record
    fn append(&mut self, record: &Record) -> Result<()>;

    /// Flush buffered data to durable storage
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Append-only text file with a header line.
///
/// The header is written only when the file is empty, so it is always the
/// first line no matter how many sessions append to the same file.
pub struct FileLogSink {
    path: PathBuf,
    file: File,
    records_written: u64,
}

impl FileLogSink {
    /// Open (or create) the log file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        if file.metadata()?.len() == 0 {
            file.write_all(header_line().as_bytes())?;
            file.flush()?;
            log::debug!("Wrote record header to {}", path.display());
        }

        log::info!("Logging records to {}", path.display());

        Ok(Self {
            path,
            file,
            records_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle
    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

impl LogSink for FileLogSink {
    fn append(&mut self, record: &Record) -> Result<()> {
        // One write per record keeps lines whole even if the process dies mid-session
        self.file.write_all(record.as_bytes())?;
        self.records_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}

/// In-memory sink; clones share the same buffer
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all appended lines
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl LogSink for MemorySink {
    fn append(&mut self, record: &Record) -> Result<()> {
        self.lines.lock().push(record.as_str().to_string());
        Ok(())
    }
}
