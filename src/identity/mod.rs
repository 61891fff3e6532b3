//! Persistent network identity.
//!
//! A device without factory-assigned addresses generates a locally
//! administered MAC and a link-local IPv4 address on first boot, stores
//! them as a named record and reuses them on every boot after that.

mod address;
mod generator;

pub use address::{
    AddressParseError, Addresses, MacAddress, OuiPrefix, SaveableIpv4Address, LOCAL_BIT,
    MULTICAST_BIT,
};
pub use generator::{AddressGenerator, IdentityMiss, IDENTITY_RECORD_NAME, MAX_OCTET_REDRAWS};
