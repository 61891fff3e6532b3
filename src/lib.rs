//! Device Identity Library
//!
//! Gives a device without factory-assigned addresses a stable network
//! identity: a locally administered MAC address and a link-local IPv4
//! address, generated once from hardware noise and kept in
//! non-volatile memory as a named, CRC-checked record.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! entropy → identity → storage
//!              ↑          ↓
//!              └──────  checksum
//! ```
//!
//! On boot the identity generator loads the stored record. If it is
//! missing, foreign or corrupted, fresh addresses are drawn from an
//! entropy source and saved under the same name.
//!
//! # Design Principles
//!
//! - **Fail-closed**: Draws with an exhausted budget return an error, never a weak value
//! - **Hardware behind traits**: Analog pins, interrupts and memory are injected
//! - **No directory**: Records are found by agreed address and name
//! - **No cryptographic claims**: Statistical tests are sanity checks, not proofs
//!
//! # Example
//!
//! ```
//! use device_identity::{
//!     entropy::{AnalogSampler, PairedChannelDebiasedSource},
//!     identity::AddressGenerator,
//!     sim::SimulatedAnalogInput,
//!     storage::{MemoryEeprom, RecordStore},
//! };
//!
//! let input = SimulatedAnalogInput::seeded(7).with_bias(0.2);
//! let sampler = AnalogSampler::new(input, vec![0, 1, 2, 3]).unwrap();
//! let source = PairedChannelDebiasedSource::with_budget(sampler, 1000);
//!
//! let mut store = RecordStore::new(MemoryEeprom::new(64));
//! let mut generator = AddressGenerator::new(source);
//!
//! let first = generator.load_or_generate_and_save(&mut store, None).unwrap();
//! let again = generator.load_or_generate_and_save(&mut store, None).unwrap();
//!
//! assert_eq!(first, again);
//! assert!(first.mac.is_locally_administered());
//! assert!(first.ip.is_link_local());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod checksum;
pub mod config;
pub mod entropy;
pub mod identity;
pub mod metrics;
pub mod reseeding;
pub mod sim;
pub mod storage;

// Re-export commonly used types at crate root
pub use analysis::{QualityThresholds, StatisticalTests};
pub use checksum::Crc32;
pub use config::FileConfig;
pub use entropy::{EntropyError, EntropySource, PairedChannelDebiasedSource, TimerJitterDigestSource};
pub use identity::{AddressGenerator, Addresses, MacAddress, OuiPrefix, SaveableIpv4Address};
pub use reseeding::{seed_system_rng, SystemRng};
pub use storage::{MemoryEeprom, NonVolatileMemory, NotFound, RecordStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
