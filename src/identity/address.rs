//! MAC and link-local IPv4 address types.

use crate::storage::Persistable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Multicast (group) bit of the first MAC byte.
pub const MULTICAST_BIT: u8 = 0x01;

/// Locally administered bit of the first MAC byte.
pub const LOCAL_BIT: u8 = 0x02;

/// Errors parsing a textual MAC address or OUI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("expected {expected} hex octets, found {found}")]
    WrongLength { expected: usize, found: usize },

    #[error("invalid hex octet {0:?}")]
    InvalidOctet(String),
}

fn parse_octets<const N: usize>(s: &str) -> Result<[u8; N], AddressParseError> {
    let parts: Vec<&str> = s.trim().split(['-', ':']).collect();
    if parts.len() != N {
        return Err(AddressParseError::WrongLength {
            expected: N,
            found: parts.len(),
        });
    }

    let mut octets = [0u8; N];
    for (octet, part) in octets.iter_mut().zip(&parts) {
        if part.is_empty() || part.len() > 2 {
            return Err(AddressParseError::InvalidOctet((*part).to_string()));
        }
        *octet = u8::from_str_radix(part, 16)
            .map_err(|_| AddressParseError::InvalidOctet((*part).to_string()))?;
    }
    Ok(octets)
}

fn write_octets(f: &mut fmt::Formatter<'_>, octets: &[u8]) -> fmt::Result {
    for (i, b) in octets.iter().enumerate() {
        if i > 0 {
            f.write_str("-")?;
        }
        write!(f, "{b:02X}")?;
    }
    Ok(())
}

/// The first three bytes of a MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OuiPrefix([u8; 3]);

impl OuiPrefix {
    /// Uses the given bytes verbatim.
    pub const fn new(a: u8, b: u8, c: u8) -> Self {
        Self([a, b, c])
    }

    /// Builds a locally administered, unicast prefix.
    ///
    /// The local bit of `a` is set and its multicast bit cleared.
    pub const fn local(a: u8, b: u8, c: u8) -> Self {
        Self([(a | LOCAL_BIT) & !MULTICAST_BIT, b, c])
    }

    /// Returns the prefix bytes.
    pub const fn bytes(&self) -> [u8; 3] {
        self.0
    }
}

impl fmt::Display for OuiPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_octets(f, &self.0)
    }
}

impl FromStr for OuiPrefix {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_octets::<3>(s).map(Self)
    }
}

impl TryFrom<String> for OuiPrefix {
    type Error = AddressParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<OuiPrefix> for String {
    fn from(oui: OuiPrefix) -> Self {
        oui.to_string()
    }
}

/// A 48-bit Ethernet address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Wraps raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Returns the address bytes.
    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Returns the first three bytes.
    pub fn oui(&self) -> OuiPrefix {
        OuiPrefix::new(self.0[0], self.0[1], self.0[2])
    }

    /// Returns true if the address starts with `prefix`.
    pub fn has_oui_prefix(&self, prefix: &OuiPrefix) -> bool {
        self.0[..3] == prefix.0
    }

    /// Returns true if the multicast bit is clear.
    pub fn is_unicast(&self) -> bool {
        self.0[0] & MULTICAST_BIT == 0
    }

    /// Returns true if the locally administered bit is set.
    pub fn is_locally_administered(&self) -> bool {
        self.0[0] & LOCAL_BIT != 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_octets(f, &self.0)
    }
}

impl FromStr for MacAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_octets::<6>(s).map(Self)
    }
}

/// An IPv4 address that can be stored in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaveableIpv4Address(Ipv4Addr);

impl SaveableIpv4Address {
    /// Builds an address from its four octets.
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self(Ipv4Addr::new(a, b, c, d))
    }

    /// Returns the octets.
    pub fn octets(&self) -> [u8; 4] {
        self.0.octets()
    }

    /// Returns true for `169.254.1.0` through `169.254.254.255`.
    ///
    /// The first and last /24 of 169.254.0.0/16 are reserved.
    pub fn is_link_local(&self) -> bool {
        let [a, b, c, _] = self.octets();
        a == 169 && b == 254 && (1..=254).contains(&c)
    }
}

impl From<Ipv4Addr> for SaveableIpv4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Self(addr)
    }
}

impl From<SaveableIpv4Address> for Ipv4Addr {
    fn from(addr: SaveableIpv4Address) -> Self {
        addr.0
    }
}

impl fmt::Display for SaveableIpv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The MAC and IPv4 address pair handed to the network interface.
///
/// Stored as one record: six MAC bytes followed by four IPv4 octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Addresses {
    pub mac: MacAddress,
    pub ip: SaveableIpv4Address,
}

impl fmt::Display for Addresses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MAC: {}   IP: {}", self.mac, self.ip)
    }
}

impl Persistable for Addresses {
    const NAME: &'static str = "addrs";
    const LEN: usize = 10;

    fn write_to(&self, out: &mut [u8]) {
        out[..6].copy_from_slice(&self.mac.0);
        out[6..10].copy_from_slice(&self.ip.octets());
    }

    fn read_from(bytes: &[u8]) -> Self {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&bytes[..6]);
        Self {
            mac: MacAddress(mac),
            ip: SaveableIpv4Address::new(bytes[6], bytes[7], bytes[8], bytes[9]),
        }
    }
}
