//! Bounded PCAP Capture Buffer
//!
//! Accumulates captured handshake frames into a fixed-size memory region
//! laid out as a classic PCAP stream: one global header followed by
//! timestamped, length-prefixed records. The byte layout is consumed by
//! downstream analysis tooling and must not change.
//!
//! The buffer never wraps or evicts; once the region is full further
//! appends fail and the storage collaborator is expected to drain it
//! (`needs_flush` reports when usage crosses the high-water mark).

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::debug;

/// PCAP global header length
pub const GLOBAL_HEADER_LEN: usize = 24;
/// Per-record header length (two timestamp fields, two length fields)
pub const RECORD_HEADER_LEN: usize = 16;

const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
const VERSION_MAJOR: u16 = 2;
const VERSION_MINOR: u16 = 4;
const SNAPLEN: u32 = 65_535;
/// Link type 105: IEEE 802.11 without radiotap
const LINKTYPE_IEEE802_11: u32 = 105;

/// Fixed-capacity, append-only PCAP buffer
#[derive(Debug)]
pub struct CaptureBuffer {
    data: Vec<u8>,
    capacity: usize,
    high_water: usize,
    records: usize,
}

impl CaptureBuffer {
    /// Create a buffer holding at most `capacity` bytes including headers.
    /// `high_water` is the usage fraction at which `needs_flush` trips.
    pub fn new(capacity: usize, high_water: f64) -> Self {
        let capacity = capacity.max(GLOBAL_HEADER_LEN);
        let mut buf = Self {
            data: Vec::with_capacity(capacity),
            capacity,
            high_water: (capacity as f64 * high_water.clamp(0.0, 1.0)) as usize,
            records: 0,
        };
        buf.reset();
        buf
    }

    /// Rewrite the global header and reset the write cursor to just past it
    pub fn reset(&mut self) {
        self.data.clear();
        self.records = 0;
        self.data.extend_from_slice(&PCAP_MAGIC.to_le_bytes());
        self.data.extend_from_slice(&VERSION_MAJOR.to_le_bytes());
        self.data.extend_from_slice(&VERSION_MINOR.to_le_bytes());
        self.data.extend_from_slice(&0i32.to_le_bytes()); // thiszone
        self.data.extend_from_slice(&0u32.to_le_bytes()); // sigfigs
        self.data.extend_from_slice(&SNAPLEN.to_le_bytes());
        self.data.extend_from_slice(&LINKTYPE_IEEE802_11.to_le_bytes());
    }

    /// Append one record if, and only if, it fits entirely.
    ///
    /// `ts` is wall-clock time since the Unix epoch. Returns whether the
    /// append succeeded; on failure the cursor is unchanged.
    pub fn append(&mut self, frame: &[u8], ts: Duration) -> bool {
        let needed = RECORD_HEADER_LEN + frame.len();
        if self.data.len() + needed > self.capacity {
            return false;
        }

        let ts_sec = ts.as_secs() as u32;
        let ts_usec = ts.subsec_micros();
        let len = frame.len() as u32;

        self.data.extend_from_slice(&ts_sec.to_le_bytes());
        self.data.extend_from_slice(&ts_usec.to_le_bytes());
        self.data.extend_from_slice(&len.to_le_bytes()); // incl_len
        self.data.extend_from_slice(&len.to_le_bytes()); // orig_len
        self.data.extend_from_slice(frame);
        self.records += 1;
        true
    }

    /// Read-only view for the storage-export collaborator
    pub fn snapshot(&self) -> &[u8] {
        &self.data
    }

    /// Bytes written so far, including the global header
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Usage has crossed the configured high-water mark
    pub fn needs_flush(&self) -> bool {
        self.data.len() >= self.high_water
    }

    /// Write the snapshot to `path` via a temporary file and rename, so a
    /// crash mid-write never leaves a torn capture behind.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("pcap.tmp");

        std::fs::write(&tmp, &self.data)
            .with_context(|| format!("Failed to write capture to {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move capture into place at {}", path.display()))?;

        debug!(
            records = self.records,
            bytes = self.data.len(),
            "capture written to {}",
            path.display()
        );
        Ok(())
    }
}

/// Read the records of a capture file previously produced by
/// [`CaptureBuffer::write_to`] (or any little-endian classic PCAP).
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<u8>>> {
    let path = path.as_ref();
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read capture file {}", path.display()))?;

    if data.len() < GLOBAL_HEADER_LEN {
        bail!("{}: truncated PCAP global header", path.display());
    }
    let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if magic != PCAP_MAGIC {
        bail!("{}: unsupported PCAP magic {magic:#010x}", path.display());
    }

    let mut records = Vec::new();
    let mut pos = GLOBAL_HEADER_LEN;
    while pos + RECORD_HEADER_LEN <= data.len() {
        let incl_len =
            u32::from_le_bytes([data[pos + 8], data[pos + 9], data[pos + 10], data[pos + 11]])
                as usize;
        let start = pos + RECORD_HEADER_LEN;
        let Some(frame) = data.get(start..start + incl_len) else {
            bail!("{}: truncated record at offset {pos}", path.display());
        };
        records.push(frame.to_vec());
        pos = start + incl_len;
    }

    Ok(records)
}
