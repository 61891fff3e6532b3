//! Named records in a flat non-volatile address space.
//!
//! Callers share one device by giving each record its own base address
//! and name. A record is only returned if both its name tag and its
//! checksum verify, so erased cells, data from another firmware version
//! and torn writes all read back as [`NotFound`].

mod memory;
mod record;

pub use memory::{ImageError, MemoryEeprom, NonVolatileMemory, ERASED_BYTE};
pub use record::{NotFound, Persistable, RecordLayout, RecordStore, StoreStats, CRC_LEN};
