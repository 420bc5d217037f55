// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Append-Only Event Log Writer
//!
//! The durable copy of the journal.
//! - Frames are only ever appended
//! - Every batch is fsync'd before `append_batch` returns
//! - Confirmation of an event is its own frame, never an in-place update
//!
//! # File Format
//! ```text
//! [Header: 16 bytes][Frame][Frame][Frame]...
//! ```
//!
//! Header:
//! - magic: [u8; 4] (`TRNK`)
//! - version: u32 (1)
//! - contract_version: u32
//! - reserved: u32 (0)
//!
//! Frame:
//! - len: u32 (payload bytes)
//! - crc32: u32 (of payload)
//! - payload: JSON-encoded [`LogEntry`]

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use trunk_kernel::config::CONTRACT_VERSION;
use trunk_kernel::types::ClientId;
use trunk_kernel::TrunkEvent;

pub const MAGIC: [u8; 4] = *b"TRNK";
pub const LOG_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 16;
pub const FRAME_HEADER_SIZE: usize = 8;

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid header")]
    InvalidHeader,

    #[error("Frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, EventLogError>;

/// One record in the on-disk log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum LogEntry {
    /// An event entering the journal; `confirmed` when it came from the remote.
    Event { event: TrunkEvent, confirmed: bool },
    /// The remote accepted a previously pending event.
    Confirmed { client_id: ClientId },
}

/// Event Log File Header (16 bytes)
pub(crate) struct EventLogHeader {
    pub version: u32,
    pub contract_version: u32,
}

impl EventLogHeader {
    fn new() -> Self {
        Self {
            version: LOG_VERSION,
            contract_version: CONTRACT_VERSION,
        }
    }

    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&MAGIC);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.contract_version.to_le_bytes());
        bytes
    }

    pub(crate) fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Option<Self> {
        if bytes[0..4] != MAGIC {
            return None;
        }
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let header = Self {
            version: word(4),
            contract_version: word(8),
        };
        (header.version == LOG_VERSION).then_some(header)
    }
}

/// Encodes one frame: `[len][crc32][json]`.
pub fn encode_frame(entry: &LogEntry) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(entry).map_err(|e| EventLogError::Serialization(e.to_string()))?;
    let len = u32::try_from(payload.len()).map_err(|_| EventLogError::FrameTooLarge(payload.len()))?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Where the store sends log entries once it decides to flush.
pub trait LogSink: Send + Sync {
    /// Durably appends every entry or returns an error. On error the caller
    /// keeps the entries and retries them on the next flush.
    fn append_batch(&mut self, entries: &[LogEntry]) -> Result<()>;
}

/// Append-Only Event Log Writer
pub struct EventLogWriter {
    path: PathBuf,
    file: BufWriter<File>,
    frames_written: u64,
}

impl EventLogWriter {
    /// Open or create an event log file.
    ///
    /// An existing non-empty file must carry a valid header; a new or empty
    /// one gets a fresh header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;

        if file.metadata()?.len() > 0 {
            let mut header_bytes = [0u8; HEADER_SIZE];
            file.read_exact(&mut header_bytes)?;
            let header = EventLogHeader::from_bytes(&header_bytes).ok_or(EventLogError::InvalidHeader)?;
            if header.contract_version != CONTRACT_VERSION {
                tracing::warn!(
                    "Event log written under contract v{}, running v{}",
                    header.contract_version,
                    CONTRACT_VERSION
                );
            }
        } else {
            file.write_all(&EventLogHeader::new().to_bytes())?;
            file.sync_all()?; // fsync header
        }

        Ok(Self {
            path,
            file: BufWriter::new(file),
            frames_written: 0,
        })
    }

    /// Opens an existing log for appending, first cutting it back to
    /// `valid_len`, the end of its last complete frame as found by recovery.
    pub fn resume(path: impl AsRef<Path>, valid_len: u64) -> Result<Self> {
        let path = path.as_ref();
        if valid_len >= HEADER_SIZE as u64 {
            let file = OpenOptions::new().write(true).open(path)?;
            let len = file.metadata()?.len();
            if len > valid_len {
                tracing::warn!(
                    "Truncating torn tail of {} ({} bytes past offset {})",
                    path.display(),
                    len - valid_len,
                    valid_len
                );
                file.set_len(valid_len)?;
                file.sync_all()?;
            }
        }
        Self::open(path)
    }

    /// Drops whatever the failed batch left behind: unflushed bytes in the
    /// buffer and any partial frames already on disk.
    fn rollback(&mut self, len: u64) -> std::io::Result<()> {
        let fresh = BufWriter::new(self.file.get_ref().try_clone()?);
        let (file, _unwritten) = std::mem::replace(&mut self.file, fresh).into_parts();
        file.set_len(len)?;
        file.sync_data()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written through this handle (not counting those already on disk).
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl LogSink for EventLogWriter {
    fn append_batch(&mut self, entries: &[LogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut batch = Vec::new();
        for entry in entries {
            batch.extend_from_slice(&encode_frame(entry)?);
        }

        let start = self.file.get_ref().metadata()?.len();
        let written = self
            .file
            .write_all(&batch)
            .and_then(|()| self.file.flush())
            // Force fsync (critical for crash safety)
            .and_then(|()| self.file.get_ref().sync_data());
        if let Err(e) = written {
            if let Err(rollback) = self.rollback(start) {
                tracing::warn!("Could not roll back partial batch at offset {}: {}", start, rollback);
            }
            return Err(e.into());
        }

        self.frames_written += entries.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use trunk_kernel::event::{EventPayload, LeafCreated};
    use trunk_kernel::time::parse_timestamp;

    fn entry(i: u32) -> LogEntry {
        let event = TrunkEvent::new(
            EventPayload::LeafCreated(LeafCreated {
                leaf_id: format!("l{i}").into(),
                twig_id: "branch-0-twig-0".into(),
                name: "saga".into(),
            }),
            parse_timestamp("2025-01-01T00:00:00.000Z").unwrap(),
        )
        .with_client_id(format!("c{i}"));
        LogEntry::Event { event, confirmed: false }
    }

    #[test]
    fn test_event_log_create_and_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");

        let mut writer = EventLogWriter::open(&path).unwrap();
        writer.append_batch(&[entry(1), entry(2)]).unwrap();

        assert_eq!(writer.frames_written(), 2);
        let len = std::fs::metadata(&path).unwrap().len() as usize;
        assert!(len > HEADER_SIZE + 2 * FRAME_HEADER_SIZE);
    }

    #[test]
    fn test_rollback_discards_partial_batch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");

        let mut writer = EventLogWriter::open(&path).unwrap();
        writer.append_batch(&[entry(1)]).unwrap();
        let good = std::fs::metadata(&path).unwrap().len();

        // Half a frame buffered, half already on disk
        let frame = encode_frame(&entry(2)).unwrap();
        writer.file.get_mut().write_all(&frame[..5]).unwrap();
        writer.file.write_all(&frame[5..9]).unwrap();
        writer.rollback(good).unwrap();

        writer.append_batch(&[entry(2)]).unwrap();
        drop(writer);
        let entries = crate::events::read_event_log(&path).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_resume_cuts_torn_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        let good = {
            let mut writer = EventLogWriter::open(&path).unwrap();
            writer.append_batch(&[entry(1)]).unwrap();
            std::fs::metadata(&path).unwrap().len()
        };
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xAB; 6]).unwrap();

        let mut writer = EventLogWriter::resume(&path, good).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), good);
        writer.append_batch(&[entry(2)]).unwrap();
        assert_eq!(crate::events::read_event_log(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_event_log_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        std::fs::write(&path, b"definitely not a trunk log").unwrap();

        assert!(matches!(EventLogWriter::open(&path), Err(EventLogError::InvalidHeader)));
    }

    #[test]
    fn test_frame_carries_checksum() {
        let frame = encode_frame(&entry(7)).unwrap();
        let len = u32::from_le_bytes(frame[0..4].try_into().unwrap()) as usize;
        let crc = u32::from_le_bytes(frame[4..8].try_into().unwrap());
        assert_eq!(len, frame.len() - FRAME_HEADER_SIZE);
        assert_eq!(crc, crc32fast::hash(&frame[FRAME_HEADER_SIZE..]));
    }
}
