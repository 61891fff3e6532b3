//! Named, CRC-checked records.
//!
//! A record occupies three consecutive regions starting at its base
//! address:
//!
//! ```text
//! [ name: len(name) ] [ crc32: 4 bytes, platform-endian ] [ payload ]
//! ```
//!
//! There is no directory. Writer and reader agree on the
//! `(base, name, payload_len)` triple ahead of time; any disagreement
//! reads back as [`NotFound`]. Changing a record's name is the way to
//! invalidate everything previously stored under the old one.

use super::NonVolatileMemory;
use crate::checksum::Crc32;
use std::cell::Cell;
use thiserror::Error;

/// Size of the stored checksum.
pub const CRC_LEN: usize = 4;

/// Why a record could not be loaded.
///
/// Both variants mean "not present" to callers; they are kept apart
/// for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFound {
    #[error("record name mismatch at address {address}")]
    NameMismatch { address: usize },

    #[error("record checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch { stored: u32, computed: u32 },
}

/// Where a record lives and how much space it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    /// Address of the first name byte.
    pub base: usize,
    /// Length of the name tag.
    pub name_len: usize,
    /// Length of the payload.
    pub payload_len: usize,
}

impl RecordLayout {
    /// Describes a record named `name` at `base`.
    pub const fn new(base: usize, name: &str, payload_len: usize) -> Self {
        Self {
            base,
            name_len: name.len(),
            payload_len,
        }
    }

    /// Address of the stored checksum.
    pub const fn crc_address(&self) -> usize {
        self.base + self.name_len
    }

    /// Address of the first payload byte.
    pub const fn payload_address(&self) -> usize {
        self.crc_address() + CRC_LEN
    }

    /// Total bytes occupied.
    pub const fn footprint(&self) -> usize {
        self.name_len + CRC_LEN + self.payload_len
    }

    /// First address past the record.
    pub const fn end(&self) -> usize {
        self.base + self.footprint()
    }

    /// Returns true if the two records share any byte.
    pub fn overlaps(&self, other: &RecordLayout) -> bool {
        self.base < other.end() && other.base < self.end()
    }

    /// Returns true if the record fits in a device of `capacity` bytes.
    pub fn fits_within(&self, capacity: usize) -> bool {
        self.end() <= capacity
    }
}

/// A fixed-size value that can be stored as a named record.
pub trait Persistable: Sized {
    /// Name tag written before the checksum.
    const NAME: &'static str;

    /// Encoded length in bytes.
    const LEN: usize;

    /// Encodes `self` into `out`, which is exactly [`LEN`](Self::LEN) bytes.
    fn write_to(&self, out: &mut [u8]);

    /// Decodes a value from exactly [`LEN`](Self::LEN) bytes.
    fn read_from(bytes: &[u8]) -> Self;
}

/// Counters for store activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub saves: u64,
    pub hits: u64,
    pub name_misses: u64,
    pub crc_misses: u64,
}

/// Reads and writes named records on a non-volatile device.
///
/// Payloads are copied in and out; the store never holds on to caller
/// buffers.
#[derive(Debug)]
pub struct RecordStore<M> {
    memory: M,
    stats: Cell<StoreStats>,
}

impl<M: NonVolatileMemory> RecordStore<M> {
    /// Wraps a device.
    pub fn new(memory: M) -> Self {
        Self {
            memory,
            stats: Cell::new(StoreStats::default()),
        }
    }

    /// Writes `payload` under `name` at `base`.
    ///
    /// The name is written verbatim, then the payload's checksum, then
    /// the payload. Existing contents are overwritten unconditionally and
    /// the caller must ensure the record fits the device.
    pub fn save(&mut self, base: usize, name: &str, payload: &[u8]) {
        let layout = RecordLayout::new(base, name, payload.len());

        for (i, &b) in name.as_bytes().iter().enumerate() {
            self.memory.update(base + i, b);
        }

        let crc = Crc32::of(payload).to_ne_bytes();
        for (i, &b) in crc.iter().enumerate() {
            self.memory.update(layout.crc_address() + i, b);
        }

        for (i, &b) in payload.iter().enumerate() {
            self.memory.update(layout.payload_address() + i, b);
        }

        self.bump(|s| s.saves += 1);
        tracing::debug!(base, name, len = payload.len(), "Record saved");
    }

    /// Reads the `expected_len`-byte payload stored under `name` at `base`.
    ///
    /// The name is compared first, stopping at the first differing byte.
    /// Only if it matches is the stored checksum compared against the
    /// checksum of the payload bytes on the device.
    pub fn load(&self, base: usize, name: &str, expected_len: usize) -> Result<Vec<u8>, NotFound> {
        let layout = self.verify(base, name, expected_len)?;
        let start = layout.payload_address();
        Ok((start..start + expected_len)
            .map(|address| self.memory.read(address))
            .collect())
    }

    /// Like [`load`](Self::load), copying into `dest`.
    ///
    /// `dest` is left untouched on failure.
    pub fn load_into(&self, base: usize, name: &str, dest: &mut [u8]) -> Result<(), NotFound> {
        let layout = self.verify(base, name, dest.len())?;
        let start = layout.payload_address();
        for (i, byte) in dest.iter_mut().enumerate() {
            *byte = self.memory.read(start + i);
        }
        Ok(())
    }

    /// Saves a typed value under its own name.
    pub fn save_record<T: Persistable>(&mut self, base: usize, value: &T) {
        let mut payload = vec![0u8; T::LEN];
        value.write_to(&mut payload);
        self.save(base, T::NAME, &payload);
    }

    /// Loads a typed value stored under its own name.
    pub fn load_record<T: Persistable>(&self, base: usize) -> Result<T, NotFound> {
        self.load(base, T::NAME, T::LEN)
            .map(|payload| T::read_from(&payload))
    }

    fn verify(&self, base: usize, name: &str, len: usize) -> Result<RecordLayout, NotFound> {
        let layout = RecordLayout::new(base, name, len);

        for (i, &expected) in name.as_bytes().iter().enumerate() {
            if self.memory.read(base + i) != expected {
                self.bump(|s| s.name_misses += 1);
                let err = NotFound::NameMismatch { address: base + i };
                tracing::debug!(base, name, error = %err, "Record not found");
                return Err(err);
            }
        }

        let mut stored = [0u8; CRC_LEN];
        for (i, byte) in stored.iter_mut().enumerate() {
            *byte = self.memory.read(layout.crc_address() + i);
        }
        let stored = u32::from_ne_bytes(stored);

        let mut crc = Crc32::new();
        for address in layout.payload_address()..layout.end() {
            crc.append(self.memory.read(address));
        }
        let computed = crc.value();

        if stored != computed {
            self.bump(|s| s.crc_misses += 1);
            let err = NotFound::CrcMismatch { stored, computed };
            tracing::debug!(base, name, error = %err, "Record not found");
            return Err(err);
        }

        self.bump(|s| s.hits += 1);
        Ok(layout)
    }

    fn bump(&self, f: impl FnOnce(&mut StoreStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    /// Returns activity counters.
    pub fn stats(&self) -> StoreStats {
        self.stats.get()
    }

    /// Returns the underlying device.
    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Returns the underlying device mutably.
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Consumes the store, returning the device.
    pub fn into_inner(self) -> M {
        self.memory
    }
}
