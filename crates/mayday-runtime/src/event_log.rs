//! Append-only log of received alert events
//!
//! Every received EMERGENCY/ACK/CLEAR lands here as one JSON line for
//! post-incident analysis. The engine only ever writes; nothing reads the
//! log back. A write failure disables the log for the rest of the run
//! instead of degrading the dispatch path.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use mayday_core::types::{EmergencyId, NodeId, Timestamp};

// ----------------------------------------------------------------------------
// Event Record
// ----------------------------------------------------------------------------

/// One received alert event
#[derive(Debug, Serialize)]
pub struct EventRecord {
    pub at: Timestamp,
    pub kind: &'static str,
    pub emergency_id: EmergencyId,
    pub originator: NodeId,
}

// ----------------------------------------------------------------------------
// Event Log
// ----------------------------------------------------------------------------

/// Write-only JSON-lines event log
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl EventLog {
    /// Open the log for appending, creating parent directories as needed
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Append one record; on failure the log disables itself
    pub fn append(&mut self, record: &EventRecord) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        let result = serde_json::to_writer(&mut *writer, record)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush());

        if let Err(e) = result {
            warn!(path = %self.path.display(), "event log write failed, disabling log: {e}");
            self.writer = None;
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
