//! Byte-addressable non-volatile memory.

use std::path::Path;
use thiserror::Error;

/// Value of a cell that has never been written.
pub const ERASED_BYTE: u8 = 0xFF;

/// A byte-addressable persistent storage device.
///
/// Addresses are not bounds-checked by callers of this trait; keeping
/// records inside the device is the caller's responsibility.
pub trait NonVolatileMemory {
    /// Returns the device size in bytes.
    fn len(&self) -> usize;

    /// Returns true if the device has no cells.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads one byte.
    fn read(&self, address: usize) -> u8;

    /// Writes one byte, skipping the physical write if it already holds
    /// `value`.
    fn update(&mut self, address: usize, value: u8);
}

impl<M: NonVolatileMemory + ?Sized> NonVolatileMemory for &mut M {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn read(&self, address: usize) -> u8 {
        (**self).read(address)
    }

    fn update(&mut self, address: usize, value: u8) {
        (**self).update(address, value)
    }
}

/// Errors loading or saving an EEPROM image file.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to access image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("image is {actual} bytes but the device holds {capacity}")]
    TooLarge { actual: usize, capacity: usize },
}

/// An EEPROM held in RAM, optionally backed by an image file.
///
/// # Panics
///
/// [`read`](NonVolatileMemory::read) and
/// [`update`](NonVolatileMemory::update) panic on addresses past the end
/// of the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEeprom {
    cells: Vec<u8>,
    updates: u64,
    writes: u64,
}

impl MemoryEeprom {
    /// Creates an erased device of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self::from_image(vec![ERASED_BYTE; capacity])
    }

    /// Wraps existing cell contents.
    pub fn from_image(cells: Vec<u8>) -> Self {
        Self {
            cells,
            updates: 0,
            writes: 0,
        }
    }

    /// Loads an image file, padding it with erased cells up to `capacity`.
    ///
    /// A missing file yields an erased device.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let mut cells = match std::fs::read(path) {
            Ok(cells) => cells,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), capacity, "No image found, starting erased");
                Vec::new()
            }
            Err(source) => {
                return Err(ImageError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        if cells.len() > capacity {
            return Err(ImageError::TooLarge {
                actual: cells.len(),
                capacity,
            });
        }
        cells.resize(capacity, ERASED_BYTE);
        Ok(Self::from_image(cells))
    }

    /// Writes the full image to `path`.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), ImageError> {
        let path = path.as_ref();
        std::fs::write(path, &self.cells).map_err(|source| ImageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bytes = self.cells.len(), "Image written");
        Ok(())
    }

    /// Resets every cell to [`ERASED_BYTE`].
    pub fn erase(&mut self) {
        self.cells.fill(ERASED_BYTE);
    }

    /// Returns the raw cell contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    /// Returns the raw cell contents for direct tampering.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }

    /// Number of [`update`](NonVolatileMemory::update) calls.
    pub fn update_count(&self) -> u64 {
        self.updates
    }

    /// Number of updates that changed a cell.
    pub fn write_count(&self) -> u64 {
        self.writes
    }
}

impl NonVolatileMemory for MemoryEeprom {
    fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn read(&self, address: usize) -> u8 {
        self.cells[address]
    }

    fn update(&mut self, address: usize, value: u8) {
        self.updates += 1;
        let cell = &mut self.cells[address];
        if *cell != value {
            *cell = value;
            self.writes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_device_is_erased() {
        let eeprom = MemoryEeprom::new(16);
        assert_eq!(eeprom.len(), 16);
        assert!(eeprom.as_bytes().iter().all(|&b| b == ERASED_BYTE));
    }

    #[test]
    fn test_update_skips_unchanged_cells() {
        let mut eeprom = MemoryEeprom::new(4);
        eeprom.update(0, 0x12);
        eeprom.update(0, 0x12);
        eeprom.update(1, ERASED_BYTE);
        assert_eq!(eeprom.update_count(), 3);
        assert_eq!(eeprom.write_count(), 1);
        assert_eq!(eeprom.read(0), 0x12);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_read_panics() {
        let eeprom = MemoryEeprom::new(4);
        eeprom.read(4);
    }

    #[test]
    fn test_image_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");

        let mut eeprom = MemoryEeprom::new(8);
        eeprom.update(3, 0x42);
        eeprom.persist(&path).unwrap();

        let reloaded = MemoryEeprom::open(&path, 8).unwrap();
        assert_eq!(reloaded.as_bytes(), eeprom.as_bytes());

        let grown = MemoryEeprom::open(&path, 12).unwrap();
        assert_eq!(grown.len(), 12);
        assert_eq!(grown.read(3), 0x42);
        assert_eq!(grown.read(11), ERASED_BYTE);

        assert!(matches!(
            MemoryEeprom::open(&path, 4),
            Err(ImageError::TooLarge { actual: 8, capacity: 4 })
        ));
    }

    #[test]
    fn test_missing_image_is_erased() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        let eeprom = MemoryEeprom::open(path, 32).unwrap();
        assert_eq!(eeprom.as_bytes(), &[ERASED_BYTE; 32][..]);
    }
}
