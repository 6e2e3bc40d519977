use std::fmt;

/// Position in a BGZF stream: compressed block offset and in-block offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualPosition(u64);

impl VirtualPosition {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(u64::MAX);

    /// Largest block offset representable in 48 bits
    pub const MAX_COMPRESSED: u64 = (1 << 48) - 1;

    /// Returns `None` if `compressed` does not fit in 48 bits.
    pub fn new(compressed: u64, uncompressed: u16) -> Option<Self> {
        if compressed > Self::MAX_COMPRESSED {
            return None;
        }
        Some(Self(compressed << 16 | u64::from(uncompressed)))
    }

    /// File offset of the block start
    pub fn compressed(self) -> u64 {
        self.0 >> 16
    }

    /// Offset inside the decompressed block
    pub fn uncompressed(self) -> u16 {
        self.0 as u16
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for VirtualPosition {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<VirtualPosition> for u64 {
    fn from(pos: VirtualPosition) -> Self {
        pos.0
    }
}

impl From<noodles::bgzf::VirtualPosition> for VirtualPosition {
    fn from(pos: noodles::bgzf::VirtualPosition) -> Self {
        Self(u64::from(pos))
    }
}

impl fmt::Display for VirtualPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.compressed(), self.uncompressed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_and_unpack() {
        let pos = VirtualPosition::new(123_456, 789).unwrap();
        assert_eq!(pos.compressed(), 123_456);
        assert_eq!(pos.uncompressed(), 789);
        assert_eq!(pos.as_raw(), 123_456 << 16 | 789);
        assert_eq!(pos.to_string(), "123456:789");
    }

    #[test]
    fn test_compressed_offset_overflow() {
        assert!(VirtualPosition::new(VirtualPosition::MAX_COMPRESSED, 0).is_some());
        assert!(VirtualPosition::new(VirtualPosition::MAX_COMPRESSED + 1, 0).is_none());
    }

    #[test]
    fn test_from_writer_position() {
        let pos = noodles::bgzf::VirtualPosition::try_from((42, 7)).unwrap();
        let pos = VirtualPosition::from(pos);
        assert_eq!((pos.compressed(), pos.uncompressed()), (42, 7));
    }

    #[test]
    fn test_ordering_follows_file_order() {
        let a = VirtualPosition::new(10, 65535).unwrap();
        let b = VirtualPosition::new(11, 0).unwrap();
        assert!(a < b);
    }
}
