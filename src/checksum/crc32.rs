//! Nibble-table CRC-32 accumulator.

/// Reflected CRC-32 table (polynomial `0xEDB88320`), one entry per nibble.
const NIBBLE_TABLE: [u32; 16] = [
    0x0000_0000, 0x1db7_1064, 0x3b6e_20c8, 0x26d9_30ac,
    0x76dc_4190, 0x6b6b_51f4, 0x4db2_6158, 0x5005_713c,
    0xedb8_8320, 0xf00f_9344, 0xd6d6_a3e8, 0xcb61_b38c,
    0x9b64_c2b0, 0x86d3_d2d4, 0xa00a_e278, 0xbdbd_f21c,
];

/// Running CRC-32 over a byte sequence.
///
/// Each appended byte is mixed in four bits at a time (low nibble first)
/// and the running value is complemented afterwards, so [`value`] is
/// always in its stored form and needs no finalisation step. For a single
/// byte this agrees with the conventional CRC-32; for longer sequences it
/// is the checksum the record format has always used.
///
/// The result depends only on the bytes appended, never on how they were
/// grouped into calls.
///
/// [`value`]: Crc32::value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    value: u32,
}

impl Crc32 {
    /// Creates a fresh accumulator.
    pub const fn new() -> Self {
        Self { value: !0 }
    }

    /// Computes the checksum of `bytes` in one go.
    pub fn of(bytes: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.extend(bytes);
        crc.value()
    }

    /// Mixes one byte into the accumulator.
    #[inline]
    pub fn append(&mut self, byte: u8) {
        let mut v = self.value;
        v = NIBBLE_TABLE[((v ^ u32::from(byte)) & 0x0f) as usize] ^ (v >> 4);
        v = NIBBLE_TABLE[((v ^ u32::from(byte >> 4)) & 0x0f) as usize] ^ (v >> 4);
        self.value = !v;
    }

    /// Mixes every byte of `bytes`, in order.
    pub fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.append(b);
        }
    }

    /// Returns the checksum of everything appended so far.
    #[inline]
    pub fn value(&self) -> u32 {
        self.value
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}
