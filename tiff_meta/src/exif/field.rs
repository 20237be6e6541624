//! A single decoded directory entry.

use tiff_meta_types::exif::{
    Endianness,
    ifd::DirectoryType,
    primitives::FieldType,
    tags::{KnownTag, TagDecoder, TagInfo},
};

use super::{
    error::FieldValueError,
    typed::{TypedValue, decode_with},
};

/// One entry of a directory, with its value bytes copied out of the blob.
///
/// Fields are read-only. To change one, copy it into an
/// [`OutputField`](crate::write::OutputField).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Field {
    tag: u16,
    directory: DirectoryType,
    field_type: FieldType,
    count: u32,
    offset: u32,
    raw: Vec<u8>,
    endianness: Endianness,
    sort_hint: i32,
}

/// Where an oversized value lives in the blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OversizedValue {
    pub offset: u32,
    pub length: u64,
}

impl OversizedValue {
    /// The value's byte range in the blob.
    pub fn range(&self) -> core::ops::Range<u64> {
        self.offset as u64..self.offset as u64 + self.length
    }
}

impl Field {
    #[expect(clippy::too_many_arguments)]
    pub(crate) fn new(
        tag: u16,
        directory: DirectoryType,
        field_type: FieldType,
        count: u32,
        offset: u32,
        raw: Vec<u8>,
        endianness: Endianness,
        sort_hint: i32,
    ) -> Self {
        Self {
            tag,
            directory,
            field_type,
            count,
            offset,
            raw,
            endianness,
            sort_hint,
        }
    }

    pub fn tag(&self) -> u16 {
        self.tag
    }

    /// The kind of directory this field was found in.
    pub fn directory_type(&self) -> DirectoryType {
        self.directory
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// The raw value/offset slot, as read.
    ///
    /// For inline values this is the value itself; otherwise it's where the
    /// value was stored.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The value's bytes, in the blob's byte order.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Position of this entry in its directory, as read.
    pub fn sort_hint(&self) -> i32 {
        self.sort_hint
    }

    /// The tag table entry for this field, if it's a tag we know.
    pub fn known_tag(&self) -> Option<KnownTag> {
        KnownTag::find(self.directory, self.tag)
    }

    pub fn tag_info(&self) -> Option<TagInfo> {
        self.known_tag().map(|k| k.info())
    }

    /// The tag's name, or `"Unknown"`.
    pub fn tag_name(&self) -> &'static str {
        self.known_tag().map(|k| k.tag_name()).unwrap_or("Unknown")
    }

    /// Size of the value in bytes: `count * width`.
    pub fn byte_length(&self) -> u64 {
        self.count as u64 * self.field_type.size_bytes() as u64
    }

    /// Whether the value fits in the entry's four-byte slot.
    pub fn is_local(&self) -> bool {
        self.byte_length() <= 4
    }

    /// Where the value lives, if it's too big to be stored inline.
    pub fn oversized_storage(&self) -> Option<OversizedValue> {
        (!self.is_local()).then_some(OversizedValue {
            offset: self.offset,
            length: self.byte_length(),
        })
    }

    /// Decodes the value, using the tag's own rule when it has one.
    pub fn value(&self) -> Result<TypedValue, FieldValueError> {
        let decoder: TagDecoder = self
            .known_tag()
            .map(|k| k.decoder())
            .unwrap_or(TagDecoder::Generic);

        decode_with(
            decoder,
            self.field_type,
            &self.raw,
            self.endianness,
            self.count,
        )
    }

    pub fn as_i32(&self) -> Result<i32, FieldValueError> {
        self.value()?.as_i32()
    }

    pub fn as_i64(&self) -> Result<i64, FieldValueError> {
        self.value()?.as_i64()
    }

    pub fn as_f64(&self) -> Result<f64, FieldValueError> {
        self.value()?.as_f64()
    }

    pub fn as_i32_array(&self) -> Result<Vec<i32>, FieldValueError> {
        self.value()?.as_i32_array()
    }

    pub fn as_i64_array(&self) -> Result<Vec<i64>, FieldValueError> {
        self.value()?.as_i64_array()
    }

    pub fn as_f64_array(&self) -> Result<Vec<f64>, FieldValueError> {
        self.value()?.as_f64_array()
    }

    /// See [`TypedValue::as_i32_or_sum`].
    pub fn as_i32_or_sum(&self) -> Result<i32, FieldValueError> {
        self.value()?.as_i32_or_sum()
    }

    pub fn as_string(&self) -> Result<Option<String>, FieldValueError> {
        self.value()?.as_string()
    }

    /// The value, rendered for people. Never fails.
    pub fn describe_value(&self) -> String {
        match self.value() {
            Ok(v) => v.describe(),
            Err(e) => format!("Invalid value: {e}"),
        }
    }

    /// `tag (0xhex: Name)`.
    pub fn description_without_value(&self) -> String {
        match self.known_tag() {
            Some(k) => k.info().description(),
            None => format!("{} (0x{:x}: Unknown (0x{:x}))", self.tag, self.tag, self.tag),
        }
    }
}

impl core::fmt::Display for Field {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}: {} ({} {})",
            self.description_without_value(),
            self.describe_value(),
            self.count,
            self.field_type.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use tiff_meta_types::exif::{Endianness, ifd::DirectoryType, primitives::FieldType};

    use super::{Field, OversizedValue};
    use crate::{
        exif::typed::{Number, TypedValue},
        util::logger,
    };

    fn field(tag: u16, dir: DirectoryType, ty: FieldType, count: u32, raw: Vec<u8>) -> Field {
        Field::new(tag, dir, ty, count, 200, raw, Endianness::Little, 0)
    }

    #[test]
    fn length_and_locality() {
        logger();

        for ty in FieldType::ALL {
            for count in [0_u32, 1, 2, 4, 5] {
                let f = field(1, DirectoryType::Root, ty, count, vec![]);
                assert_eq!(f.byte_length(), count as u64 * ty.size_bytes() as u64);
                assert_eq!(f.is_local(), f.byte_length() <= 4);
                assert_eq!(f.oversized_storage().is_none(), f.is_local());
            }
        }
    }

    #[test]
    fn oversized_storage_points_at_the_value() {
        logger();

        let f = field(270, DirectoryType::Root, FieldType::Ascii, 12, vec![b'a'; 12]);
        assert_eq!(
            f.oversized_storage(),
            Some(OversizedValue {
                offset: 200,
                length: 12
            })
        );
        assert_eq!(f.oversized_storage().unwrap().range(), 200..212);
    }

    #[test]
    fn display_known_and_unknown() {
        logger();

        let make = field(271, DirectoryType::Root, FieldType::Ascii, 6, b"Canon\0".to_vec());
        assert_eq!(make.to_string(), "271 (0x10f: Make): 'Canon' (6 ASCII)");

        let unknown = field(
            0xC000,
            DirectoryType::Root,
            FieldType::Short,
            1,
            3_u16.to_le_bytes().to_vec(),
        );
        assert_eq!(unknown.tag_name(), "Unknown");
        assert_eq!(
            unknown.to_string(),
            "49152 (0xc000: Unknown (0xc000)): 3 (1 Short)"
        );
    }

    #[test]
    fn broken_values_still_describe() {
        logger();

        let f = field(256, DirectoryType::Root, FieldType::Long, 3, vec![0; 4]);
        assert!(f.describe_value().starts_with("Invalid value: "));
    }

    #[test]
    fn value_uses_the_tag_decoder() {
        logger();

        // GPS tag 2 is the latitude, which is always a list
        let mut raw = Vec::new();
        raw.extend_from_slice(&40_u32.to_le_bytes());
        raw.extend_from_slice(&1_u32.to_le_bytes());
        let f = field(2, DirectoryType::Gps, FieldType::Rational, 1, raw.clone());
        assert!(matches!(f.value(), Ok(TypedValue::NumberArray(v)) if v.len() == 1));

        // the same number in IFD 0 is just a rational
        let f = field(2, DirectoryType::Root, FieldType::Rational, 1, raw);
        assert!(matches!(
            f.value(),
            Ok(TypedValue::Scalar(Number::Rational(_)))
        ));
    }

    #[test]
    fn accessors_forward_to_the_value() {
        logger();

        let mut raw = Vec::new();
        for v in [10_u16, 20, 30] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let f = field(279, DirectoryType::Root, FieldType::Short, 3, raw);

        assert_eq!(f.as_i32_or_sum(), Ok(60));
        assert_eq!(f.as_i64_array(), Ok(vec![10, 20, 30]));
        assert!(f.as_i32().is_err());
    }
}
