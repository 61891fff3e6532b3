//! Streaming checksums for stored records.
//!
//! The record store validates every payload it reads back against a
//! CRC-32 written alongside it. The accumulator here is the exact
//! on-device variant, so images written by older firmware still verify.

mod crc32;

pub use crc32::Crc32;
