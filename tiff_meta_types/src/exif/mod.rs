//! Types describing TIFF-structured (Exif) metadata.

pub mod ifd;
pub mod primitives;
pub mod tags;

/// Each blob of TIFF metadata starts with a byte order marker - its
/// endianness.
///
/// It's either `II` (Intel, for little-endian) or `MM` (Motorola, for
/// big-endian).
///
/// Every multi-byte value in the blob, including inline values stored in a
/// directory entry's offset slot, uses this order.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Hash, PartialEq, PartialOrd, Eq, Ord)]
pub enum Endianness {
    /// `II` for Intel, little-endian.
    Little,

    /// `MM` for Motorola. Big-endian.
    Big,
}

impl Endianness {
    /// The two-byte marker that opens a TIFF header in this byte order.
    ///
    /// ```
    /// use tiff_meta_types::exif::Endianness;
    ///
    /// assert_eq!(Endianness::Little.marker(), *b"II");
    /// assert_eq!(Endianness::Big.marker(), *b"MM");
    /// ```
    pub const fn marker(&self) -> [u8; 2] {
        match self {
            Endianness::Little => *b"II",
            Endianness::Big => *b"MM",
        }
    }

    pub fn u16_bytes(&self, value: u16) -> [u8; 2] {
        match self {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }

    pub fn u32_bytes(&self, value: u32) -> [u8; 4] {
        match self {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }

    pub fn u64_bytes(&self, value: u64) -> [u8; 8] {
        match self {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }

    pub fn read_u32(&self, bytes: [u8; 4]) -> u32 {
        match self {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        }
    }
}
