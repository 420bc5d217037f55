// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Replay - Recovery of the local journal
//!
//! # Recovery Protocol
//! 1. Validate the header
//! 2. Decode frames in order, verifying each checksum
//! 3. Feed every record to a fresh journal
//!
//! # Invariants
//! - A frame cut short at the end of the file is a crash mid-write:
//!   recover everything before it and warn. The writer cuts the tail off
//!   before appending, so new frames never follow garbage
//! - A complete frame with a bad checksum or undecodable payload is
//!   corruption: fail closed
//! - Replaying the same file twice yields the same journal

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

use super::event_journal::EventJournal;
use super::event_log::{EventLogHeader, LogEntry, FRAME_HEADER_SIZE, HEADER_SIZE};

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Event log header invalid")]
    InvalidHeader,

    #[error("Event log corrupted at offset {offset}")]
    Corrupted { offset: usize },

    #[error("Log entry at offset {offset} could not be decoded: {reason}")]
    Decode { offset: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, ReplayError>;

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Complete records of a log plus where they end.
#[derive(Debug)]
pub struct ScannedLog {
    pub entries: Vec<LogEntry>,
    /// Offset just past the last complete frame. Anything beyond it is a torn tail.
    pub valid_len: u64,
    pub file_len: u64,
}

impl ScannedLog {
    pub fn torn_bytes(&self) -> u64 {
        self.file_len - self.valid_len
    }
}

/// Decodes every complete record of a log.
///
/// Offsets in errors are absolute file offsets.
pub fn scan_event_log(path: impl AsRef<Path>) -> Result<ScannedLog> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);

    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    if buffer.is_empty() {
        return Ok(ScannedLog {
            entries: Vec::new(),
            valid_len: 0,
            file_len: 0,
        });
    }
    let header: [u8; HEADER_SIZE] = buffer
        .get(..HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or(ReplayError::InvalidHeader)?;
    EventLogHeader::from_bytes(&header).ok_or(ReplayError::InvalidHeader)?;

    let mut entries = Vec::new();
    let mut offset = HEADER_SIZE;
    while offset < buffer.len() {
        let remaining = buffer.len() - offset;
        if remaining < FRAME_HEADER_SIZE {
            tracing::warn!("Ignoring incomplete frame header at end of log (offset {})", offset);
            break;
        }
        let len = read_u32(&buffer, offset) as usize;
        let crc = read_u32(&buffer, offset + 4);
        if remaining - FRAME_HEADER_SIZE < len {
            // Likely tail corruption from crash mid-write
            tracing::warn!(
                "Ignoring incomplete frame at end of log (offset {}, {} of {} bytes)",
                offset,
                remaining - FRAME_HEADER_SIZE,
                len
            );
            break;
        }

        let payload = &buffer[offset + FRAME_HEADER_SIZE..offset + FRAME_HEADER_SIZE + len];
        if crc32fast::hash(payload) != crc {
            return Err(ReplayError::Corrupted { offset });
        }
        let entry = serde_json::from_slice::<LogEntry>(payload).map_err(|e| ReplayError::Decode {
            offset,
            reason: e.to_string(),
        })?;
        entries.push(entry);
        offset += FRAME_HEADER_SIZE + len;
    }

    Ok(ScannedLog {
        entries,
        valid_len: offset as u64,
        file_len: buffer.len() as u64,
    })
}

pub fn read_event_log(path: impl AsRef<Path>) -> Result<Vec<LogEntry>> {
    Ok(scan_event_log(path)?.entries)
}

/// Rebuilds the journal from a log file. A missing file is an empty journal.
pub fn recover_journal(path: impl AsRef<Path>) -> Result<EventJournal> {
    Ok(recover(path)?.0)
}

/// Like [`recover_journal`], also returning the length of the intact prefix
/// so a writer can cut off a torn tail before appending.
pub(crate) fn recover(path: impl AsRef<Path>) -> Result<(EventJournal, u64)> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!("No event log at {}, starting empty", path.display());
        return Ok((EventJournal::new(), 0));
    }

    let scanned = scan_event_log(path)?;
    let total = scanned.entries.len();
    let mut journal = EventJournal::new();
    let mut redundant = 0usize;
    for entry in scanned.entries {
        if !journal.apply_log_entry(entry) {
            redundant += 1;
        }
    }

    tracing::info!(
        "Recovered {} events ({} pending) from {} records in {}",
        journal.len(),
        journal.pending_len(),
        total,
        path.display()
    );
    if redundant > 0 {
        tracing::debug!("{} log records were redundant", redundant);
    }
    Ok((journal, scanned.valid_len))
}
