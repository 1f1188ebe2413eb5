//! Per-bucket branch bitmap.

const BIT_SET_SHIFT: u32 = 3;
const BIT_SET_MASK: u8 = (1 << BIT_SET_SHIFT) - 1;

/// Size of a [`BitSet`] in bytes (one bit per possible next hash byte).
pub const BIT_SET_BYTES: usize = 256 / (1 << BIT_SET_SHIFT);

/// 256-bit bitmap stored in every bucket.
///
/// Bit `o` set means items whose hash byte at the bucket's depth equals `o`
/// have been pushed into the deeper bucket for that byte, and are not stored
/// in this bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BitSet([u8; BIT_SET_BYTES]);

impl BitSet {
    /// Create an empty bitset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap raw bitset bytes.
    pub fn from_bytes(bytes: [u8; BIT_SET_BYTES]) -> Self {
        Self(bytes)
    }

    /// Raw bitset bytes.
    pub fn as_bytes(&self) -> &[u8; BIT_SET_BYTES] {
        &self.0
    }

    /// Whether the branch for `offset` lives in a deeper bucket.
    pub fn get_bit(&self, offset: u8) -> bool {
        let (byte, mask) = Self::locate(offset);
        self.0[byte] & mask != 0
    }

    pub fn set_bit(&mut self, offset: u8) {
        let (byte, mask) = Self::locate(offset);
        self.0[byte] |= mask;
    }

    pub fn clear_bit(&mut self, offset: u8) {
        let (byte, mask) = Self::locate(offset);
        self.0[byte] &= !mask;
    }

    /// Number of branches pushed deeper.
    pub fn count_ones(&self) -> u32 {
        self.0.iter().map(|b| b.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Offsets of all set bits, ascending.
    pub fn iter_ones(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |&offset| self.get_bit(offset))
    }

    fn locate(offset: u8) -> (usize, u8) {
        let byte = (offset >> BIT_SET_SHIFT) as usize;
        let mask = 1 << (offset & BIT_SET_MASK);
        (byte, mask)
    }
}
