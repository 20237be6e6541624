//! Mutable mirrors of [`Field`] and [`Directory`](crate::exif::Directory).

use tiff_meta_types::exif::{
    Endianness,
    ifd::DirectoryType,
    primitives::FieldType,
    tags::{KnownTag, TagDecoder},
};

use crate::exif::{
    error::FieldValueError,
    field::Field,
    typed::{TypedValue, decode, decode_with, encode},
};

/// A field waiting to be written.
///
/// Unlike [`Field`], this has no offset: where the value goes is decided
/// when the whole set is laid out.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputField {
    tag: u16,
    directory: DirectoryType,
    field_type: FieldType,
    count: u32,
    raw: Vec<u8>,
    endianness: Endianness,
    sort_hint: i32,
}

impl OutputField {
    /// Makes a field from bytes that are already encoded.
    ///
    /// `raw` should hold `count * width` bytes in the given byte order.
    /// Anything else is rejected when the field is written.
    pub fn new(
        tag: u16,
        directory: DirectoryType,
        field_type: FieldType,
        count: u32,
        raw: Vec<u8>,
        endianness: Endianness,
    ) -> Self {
        Self {
            tag,
            directory,
            field_type,
            count,
            raw,
            endianness,
            sort_hint: 0,
        }
    }

    /// Encodes a value as the given type.
    pub fn from_value(
        tag: u16,
        directory: DirectoryType,
        field_type: FieldType,
        value: &TypedValue,
        endianness: Endianness,
    ) -> Result<Self, FieldValueError> {
        let (raw, count) = encode(field_type, value, endianness)?;
        Ok(Self::new(tag, directory, field_type, count, raw, endianness))
    }

    /// Copies a decoded field, keeping its bytes and sort hint.
    pub fn from_field(field: &Field) -> Self {
        Self {
            tag: field.tag(),
            directory: field.directory_type(),
            field_type: field.field_type(),
            count: field.count(),
            raw: field.raw_bytes().to_vec(),
            endianness: field.endianness(),
            sort_hint: field.sort_hint(),
        }
    }

    pub fn tag(&self) -> u16 {
        self.tag
    }

    pub fn directory_type(&self) -> DirectoryType {
        self.directory
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Breaks ties when two entries share a tag. Lower goes first.
    pub fn sort_hint(&self) -> i32 {
        self.sort_hint
    }

    pub fn set_sort_hint(&mut self, sort_hint: i32) {
        self.sort_hint = sort_hint;
    }

    /// Size of the value in bytes: `count * width`.
    pub fn byte_length(&self) -> u64 {
        self.count as u64 * self.field_type.size_bytes() as u64
    }

    /// Whether the value will be stored in the entry itself.
    pub fn is_local(&self) -> bool {
        self.byte_length() <= 4
    }

    /// Decodes the value, the same way [`Field::value`] does.
    pub fn value(&self) -> Result<TypedValue, FieldValueError> {
        let decoder: TagDecoder = KnownTag::find(self.directory, self.tag)
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

    /// The same field with its bytes in another byte order.
    pub(crate) fn reordered(&self, endianness: Endianness) -> Result<Self, FieldValueError> {
        if endianness == self.endianness {
            return Ok(self.clone());
        }

        // single-byte types look the same either way. ascii also shouldn't
        // go through text decoding, which would eat its NULs
        let raw: Vec<u8> = if self.field_type.size_bytes() == 1 {
            self.raw.clone()
        } else {
            let value: TypedValue =
                decode(self.field_type, &self.raw, self.endianness, self.count)?;
            encode(self.field_type, &value, endianness)?.0
        };

        Ok(Self {
            raw,
            endianness,
            ..self.clone()
        })
    }
}

/// A directory waiting to be written.
///
/// Tags are unique: setting a tag that's already here replaces it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputDirectory {
    kind: DirectoryType,
    endianness: Endianness,
    fields: Vec<OutputField>,
    thumbnail: Option<Vec<u8>>,
}

impl OutputDirectory {
    pub fn new(kind: DirectoryType, endianness: Endianness) -> Self {
        Self {
            kind,
            endianness,
            fields: Vec::new(),
            thumbnail: None,
        }
    }

    pub fn kind(&self) -> DirectoryType {
        self.kind
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn fields(&self) -> &[OutputField] {
        &self.fields
    }

    pub fn find_field(&self, tag: u16) -> Option<&OutputField> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Whether there's nothing here to write.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.thumbnail.is_none()
    }

    /// Sets a tag to the given value, picking the field type for you.
    ///
    /// The value's own type is used when the tag table allows it (or the tag
    /// isn't in the table). Otherwise, the table's preferred type is tried.
    pub fn set_field(&mut self, tag: u16, value: TypedValue) -> Result<(), FieldValueError> {
        let natural: FieldType = value.natural_type();

        let field_type: FieldType = match KnownTag::find(self.kind, tag) {
            Some(known) if !known.types().contains(&natural) => {
                let preferred: FieldType = known.info().preferred_type();

                if encode(preferred, &value, self.endianness).is_ok() {
                    preferred
                } else {
                    log::warn!(
                        "Tag `{known:?}` expects one of {:?}, but the value is {}. \
                        Writing it as `{natural:?}` anyway.",
                        known.types(),
                        value.kind_name()
                    );
                    natural
                }
            }
            _ => natural,
        };

        self.set_field_with_type(tag, field_type, &value)
    }

    /// Sets a tag to the given value, encoded as exactly `field_type`.
    pub fn set_field_with_type(
        &mut self,
        tag: u16,
        field_type: FieldType,
        value: &TypedValue,
    ) -> Result<(), FieldValueError> {
        let field =
            OutputField::from_value(tag, self.kind, field_type, value, self.endianness)?;
        self.add_field(field)
    }

    /// Adds a field, replacing any field with the same tag in place.
    ///
    /// Fields in the other byte order are converted first.
    pub fn add_field(&mut self, field: OutputField) -> Result<(), FieldValueError> {
        let mut field: OutputField = field.reordered(self.endianness)?;
        field.directory = self.kind;

        match self.fields.iter_mut().find(|f| f.tag == field.tag) {
            Some(existing) => {
                log::trace!("Replacing field `{}` in {} directory.", field.tag, self.kind.name());
                field.sort_hint = existing.sort_hint;
                *existing = field;
            }
            None => {
                if field.sort_hint == 0 {
                    field.sort_hint = i32::try_from(self.fields.len()).unwrap_or(i32::MAX);
                }
                self.fields.push(field);
            }
        }

        Ok(())
    }

    /// Removes the field with this tag, if there is one.
    pub fn remove_field(&mut self, tag: u16) -> Option<OutputField> {
        let index: usize = self.fields.iter().position(|f| f.tag == tag)?;
        Some(self.fields.remove(index))
    }

    /// Embedded JPEG thumbnail bytes.
    pub fn thumbnail(&self) -> Option<&[u8]> {
        self.thumbnail.as_deref()
    }

    /// Sets (or, with `None`, removes) this directory's JPEG thumbnail.
    ///
    /// Its offset and length tags are written for you.
    pub fn set_thumbnail(&mut self, thumbnail: Option<Vec<u8>>) {
        self.thumbnail = thumbnail;
    }

    /// Converts every field to another byte order.
    pub(crate) fn reordered(&self, endianness: Endianness) -> Result<Self, FieldValueError> {
        Ok(Self {
            kind: self.kind,
            endianness,
            fields: self
                .fields
                .iter()
                .map(|f| f.reordered(endianness))
                .collect::<Result<Vec<_>, _>>()?,
            thumbnail: self.thumbnail.clone(),
        })
    }
}
