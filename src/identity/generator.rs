//! Address synthesis and the load-or-generate policy.

use super::address::{
    Addresses, MacAddress, OuiPrefix, SaveableIpv4Address, LOCAL_BIT, MULTICAST_BIT,
};
use crate::entropy::{EntropyError, EntropySource};
use crate::storage::{NonVolatileMemory, NotFound, Persistable, RecordLayout, RecordStore};
use thiserror::Error;

/// Name of the identity record.
pub const IDENTITY_RECORD_NAME: &str = Addresses::NAME;

/// Redraws allowed while rejection-sampling the third IPv4 octet.
///
/// Each draw is rejected with probability 2/256, so exhausting this
/// bound means the source is stuck rather than unlucky.
pub const MAX_OCTET_REDRAWS: u32 = 256;

/// Why no usable identity was loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityMiss {
    #[error("no identity record: {0}")]
    NotFound(#[from] NotFound),

    #[error("stored MAC {found} does not start with required prefix {expected}")]
    OuiMismatch { found: MacAddress, expected: OuiPrefix },
}

/// Generates and persists the device's network identity.
///
/// The entropy source is injected so tests can drive generation from a
/// fixed byte script and assert exact addresses.
#[derive(Debug)]
pub struct AddressGenerator<S> {
    source: S,
    record_address: usize,
    record_name: String,
}

impl<S> AddressGenerator<S> {
    /// Stores the identity at address 0 under [`IDENTITY_RECORD_NAME`].
    pub fn new(source: S) -> Self {
        Self {
            source,
            record_address: 0,
            record_name: IDENTITY_RECORD_NAME.to_string(),
        }
    }

    /// Moves the identity record.
    ///
    /// Renaming the record makes previously stored identities invisible,
    /// so the next boot generates a fresh one.
    pub fn with_record(mut self, address: usize, name: impl Into<String>) -> Self {
        self.record_address = address;
        self.record_name = name.into();
        self
    }

    /// Returns where the identity record lives.
    pub fn layout(&self) -> RecordLayout {
        RecordLayout::new(self.record_address, &self.record_name, Addresses::LEN)
    }

    /// Loads the stored identity.
    ///
    /// A record whose MAC does not start with `oui` is reported as a miss.
    pub fn load<M: NonVolatileMemory>(
        &self,
        store: &RecordStore<M>,
        oui: Option<&OuiPrefix>,
    ) -> Result<Addresses, IdentityMiss> {
        let payload = store.load(self.record_address, &self.record_name, Addresses::LEN)?;
        let addrs = Addresses::read_from(&payload);
        match oui {
            Some(prefix) if !addrs.mac.has_oui_prefix(prefix) => Err(IdentityMiss::OuiMismatch {
                found: addrs.mac,
                expected: *prefix,
            }),
            _ => Ok(addrs),
        }
    }

    /// Returns the entropy source.
    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: EntropySource> AddressGenerator<S> {
    /// Synthesizes a fresh address pair.
    ///
    /// Without `oui`, all six MAC bytes are drawn and the first is forced
    /// to a unicast, locally administered value. With `oui`, the prefix is
    /// copied verbatim and only the three suffix bytes are drawn. The
    /// IPv4 address is `169.254.c.d` with `c` in `1..=254`.
    pub fn generate(&mut self, oui: Option<&OuiPrefix>) -> Result<Addresses, EntropyError> {
        let mut mac = [0u8; 6];
        match oui {
            Some(prefix) => {
                mac[..3].copy_from_slice(&prefix.bytes());
                self.source.fill_bytes(&mut mac[3..])?;
            }
            None => {
                self.source.fill_bytes(&mut mac)?;
                mac[0] = (mac[0] | LOCAL_BIT) & !MULTICAST_BIT;
            }
        }

        let subnet = self.link_local_subnet()?;
        let host = self.source.random_byte()?;

        let addrs = Addresses {
            mac: MacAddress::new(mac),
            ip: SaveableIpv4Address::new(169, 254, subnet, host),
        };
        tracing::debug!(mac = %addrs.mac, ip = %addrs.ip, "Addresses generated");
        Ok(addrs)
    }

    fn link_local_subnet(&mut self) -> Result<u8, EntropyError> {
        for attempt in 0..MAX_OCTET_REDRAWS {
            let octet = self.source.random_byte()?;
            if (1..=254).contains(&octet) {
                return Ok(octet);
            }
            tracing::trace!(octet, attempt, "Reserved link-local subnet rejected");
        }
        Err(EntropyError::RejectionExhausted {
            attempts: MAX_OCTET_REDRAWS,
        })
    }

    /// Returns the stored identity, or generates and saves a new one.
    ///
    /// A hit performs no writes. A miss performs exactly one save. If
    /// generation fails, the store is left untouched.
    pub fn load_or_generate_and_save<M: NonVolatileMemory>(
        &mut self,
        store: &mut RecordStore<M>,
        oui: Option<&OuiPrefix>,
    ) -> Result<Addresses, EntropyError> {
        match self.load(store, oui) {
            Ok(addrs) => {
                tracing::info!(mac = %addrs.mac, ip = %addrs.ip, "Loaded stored identity");
                return Ok(addrs);
            }
            Err(miss) => tracing::info!(reason = %miss, "Generating new identity"),
        }

        let addrs = self.generate(oui)?;
        let mut payload = [0u8; Addresses::LEN];
        addrs.write_to(&mut payload);
        store.save(self.record_address, &self.record_name, &payload);

        tracing::info!(
            mac = %addrs.mac,
            ip = %addrs.ip,
            address = self.record_address,
            "Identity saved"
        );
        Ok(addrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::fake::{RngSource, ScriptedSource};
    use crate::storage::MemoryEeprom;
    use proptest::prelude::*;

    fn store() -> RecordStore<MemoryEeprom> {
        RecordStore::new(MemoryEeprom::new(64))
    }

    #[test]
    fn test_generate_without_oui() {
        // MAC bytes, two rejected subnets, then subnet and host.
        let script = [0x01, 0x11, 0x22, 0x33, 0x44, 0x55, 0, 255, 7, 9];
        let mut generator = AddressGenerator::new(ScriptedSource::bytes(script));

        let addrs = generator.generate(None).unwrap();
        assert_eq!(addrs.mac, MacAddress::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]));
        assert_eq!(addrs.ip, SaveableIpv4Address::new(169, 254, 7, 9));
        assert_eq!(generator.source().remaining(), 0);
    }

    #[test]
    fn test_generate_with_oui_keeps_prefix_verbatim() {
        // A multicast prefix is still trusted as given.
        let oui = OuiPrefix::new(0x01, 0xAB, 0xCD);
        let mut generator = AddressGenerator::new(ScriptedSource::bytes([0xFF, 0x00, 0x10, 3, 4]));

        let addrs = generator.generate(Some(&oui)).unwrap();
        assert_eq!(addrs.mac, MacAddress::new([0x01, 0xAB, 0xCD, 0xFF, 0x00, 0x10]));
        assert_eq!(addrs.ip, SaveableIpv4Address::new(169, 254, 3, 4));
    }

    #[test]
    fn test_generate_fails_when_source_runs_dry() {
        let mut generator = AddressGenerator::new(ScriptedSource::bytes([1, 2, 3, 4, 5, 6, 7]));
        assert!(matches!(
            generator.generate(None),
            Err(EntropyError::InsufficientEntropy { .. })
        ));
    }

    #[test]
    fn test_stuck_source_exhausts_rejection() {
        let script = [0u8; 6].into_iter().chain(std::iter::repeat(255).take(300));
        let mut generator = AddressGenerator::new(ScriptedSource::bytes(script));
        assert_eq!(
            generator.generate(None),
            Err(EntropyError::RejectionExhausted {
                attempts: MAX_OCTET_REDRAWS
            })
        );
    }

    #[test]
    fn test_load_or_generate_is_idempotent() {
        let mut store = store();
        let mut generator = AddressGenerator::new(RngSource::seeded(7));

        let first = generator.load_or_generate_and_save(&mut store, None).unwrap();
        let updates = store.memory().update_count();
        assert_eq!(store.stats().saves, 1);

        let second = generator.load_or_generate_and_save(&mut store, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.stats().saves, 1);
        assert_eq!(store.memory().update_count(), updates);
    }

    #[test]
    fn test_identity_survives_power_cycle() {
        let mut store = store();
        let first = AddressGenerator::new(RngSource::seeded(1))
            .load_or_generate_and_save(&mut store, None)
            .unwrap();

        let mut store = RecordStore::new(store.into_inner());
        let mut generator = AddressGenerator::new(ScriptedSource::bytes([]));
        assert_eq!(generator.load_or_generate_and_save(&mut store, None), Ok(first));
    }

    #[test]
    fn test_oui_mismatch_regenerates() {
        let mut store = store();
        let mut generator = AddressGenerator::new(RngSource::seeded(3));
        generator.load_or_generate_and_save(&mut store, None).unwrap();

        let oui = OuiPrefix::new(0x00, 0x1B, 0x21);
        assert!(matches!(
            generator.load(&store, Some(&oui)),
            Err(IdentityMiss::OuiMismatch { .. })
        ));

        let addrs = generator.load_or_generate_and_save(&mut store, Some(&oui)).unwrap();
        assert!(addrs.mac.has_oui_prefix(&oui));
        assert_eq!(store.stats().saves, 2);
        assert_eq!(generator.load(&store, Some(&oui)), Ok(addrs));
    }

    #[test]
    fn test_renamed_record_is_a_miss() {
        let mut store = store();
        let mut generator = AddressGenerator::new(RngSource::seeded(5));
        generator.load_or_generate_and_save(&mut store, None).unwrap();

        let generator = generator.with_record(0, "addr2");
        assert!(matches!(
            generator.load(&store, None),
            Err(IdentityMiss::NotFound(NotFound::NameMismatch { address: 4 }))
        ));
    }

    #[test]
    fn test_failed_generation_leaves_store_untouched() {
        let mut store = store();
        let mut generator = AddressGenerator::new(ScriptedSource::bytes([1, 2, 3]));
        assert!(generator.load_or_generate_and_save(&mut store, None).is_err());
        assert_eq!(store.memory().update_count(), 0);
    }

    #[test]
    fn test_record_layout_matches_store() {
        let mut store = store();
        let mut generator = AddressGenerator::new(RngSource::seeded(9)).with_record(20, "addrs");
        let addrs = generator.load_or_generate_and_save(&mut store, None).unwrap();

        let layout = generator.layout();
        assert_eq!(layout.end(), 39);
        let cells = store.memory().as_bytes();
        assert_eq!(&cells[20..25], b"addrs");
        assert_eq!(&cells[layout.payload_address()..layout.end()][..6], &addrs.mac.bytes());
    }

    proptest! {
        #[test]
        fn prop_generated_addresses_are_valid(seed in any::<u64>()) {
            let mut generator = AddressGenerator::new(RngSource::seeded(seed));
            let addrs = generator.generate(None).unwrap();
            prop_assert!(addrs.mac.is_unicast());
            prop_assert!(addrs.mac.is_locally_administered());
            prop_assert!(addrs.ip.is_link_local());
        }

        #[test]
        fn prop_oui_is_preserved(seed in any::<u64>(), prefix in any::<[u8; 3]>()) {
            let oui = OuiPrefix::new(prefix[0], prefix[1], prefix[2]);
            let mut generator = AddressGenerator::new(RngSource::seeded(seed));
            let addrs = generator.generate(Some(&oui)).unwrap();
            prop_assert_eq!(addrs.mac.oui(), oui);
            prop_assert!(addrs.ip.is_link_local());
        }
    }
}
