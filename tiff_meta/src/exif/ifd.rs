use rustc_hash::FxHashSet;
use tiff_meta_types::exif::ifd::DirectoryType;
use winnow::{
    Parser,
    binary::{u16, u32},
    combinator::repeat,
    error::EmptyError,
};

use super::{
    NextIfdPointer, Stream,
    error::{ExifFatalError, ExifFieldError},
    field::Field,
    value::{RawEntry, parse_value},
};

/// Index of a directory inside an [`Exif`](super::Exif).
#[derive(Clone, Copy, Debug, Hash, PartialEq, PartialOrd, Eq, Ord)]
pub struct DirectoryId(pub(crate) usize);

impl DirectoryId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// An image file directory found within Exif metadata.
///
/// These contain a number of fields and directions to the directories hanging
/// off of them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Directory {
    pub(super) kind: DirectoryType,
    pub(super) offset: u32,
    pub(super) entry_count: u16,
    pub(super) fields: Vec<Field>,
    pub(super) children: Vec<(u16, DirectoryId)>,
    pub(super) next: Option<DirectoryId>,
    pub(super) thumbnail: Option<Vec<u8>>,
    pub(super) errors: Vec<ExifFieldError>,
}

impl Directory {
    pub fn kind(&self) -> DirectoryType {
        self.kind
    }

    /// Where this directory's table was found in the blob.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// How many entries the table held, unreadable ones included.
    pub fn entry_count(&self) -> u16 {
        self.entry_count
    }

    /// Bytes the table takes up in the blob, next-IFD pointer included.
    pub fn table_len(&self) -> u64 {
        2 + 12 * self.entry_count as u64 + 4
    }

    /// The fields, in the order they were stored.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Finds a field with exactly this tag, in this directory only.
    pub fn find_field(&self, tag: u16) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag() == tag)
    }

    /// Child directories, with the pointer tag that led to each.
    pub fn children(&self) -> &[(u16, DirectoryId)] {
        &self.children
    }

    /// The next directory on the IFD chain.
    pub fn next(&self) -> Option<DirectoryId> {
        self.next
    }

    /// Embedded JPEG thumbnail bytes, if this directory points at one.
    pub fn thumbnail(&self) -> Option<&[u8]> {
        self.thumbnail.as_deref()
    }

    /// Entries that couldn't be read and were skipped.
    pub fn errors(&self) -> &[ExifFieldError] {
        &self.errors
    }
}

/// The contents of one directory table.
#[derive(Debug)]
pub(super) struct Table {
    pub entry_count: u16,
    pub fields: Vec<Field>,
    pub errors: Vec<ExifFieldError>,
}

/// Parses out an entire directory table.
///
/// The stream must start at the table's entry count.
pub(super) fn parse_ifd(input: &mut Stream) -> Result<(Table, NextIfdPointer), ExifFatalError> {
    let directory: DirectoryType = input.state.directory;
    let endianness = input.state.winnow_endianness;

    let entry_count: u16 = u16(endianness).parse_next(input).map_err(|_: EmptyError| {
        log::error!("Couldn't find count on IFD - ran out of data!");
        ExifFatalError::IfdNoEntryCount { directory }
    })?;

    if entry_count == 0 {
        log::warn!("{} directory reported itself as having zero fields.", directory.name());
    }

    // grab the whole table up front so a bad entry can't desync the rest
    log::trace!("Parsing `{entry_count}` fields...");
    let entries: Vec<RawEntry> = repeat(
        entry_count as usize,
        (u16(endianness), u16(endianness), u32(endianness), u32(endianness)).map(
            |(tag, raw_type, count, slot)| RawEntry {
                tag,
                raw_type,
                count,
                slot,
            },
        ),
    )
    .parse_next(input)
    .map_err(|_: EmptyError| {
        log::error!("{} directory's entries ran past the blob!", directory.name());
        ExifFatalError::IfdTruncated {
            directory,
            entry_count,
        }
    })?;

    let mut table = Table {
        entry_count,
        fields: Vec::with_capacity(entries.len()),
        errors: Vec::new(),
    };
    let mut seen_tags: FxHashSet<u16> = FxHashSet::default();

    for (index, entry) in entries.into_iter().enumerate() {
        // only a readable entry claims its tag
        if seen_tags.contains(&entry.tag) {
            log::warn!(
                "Dropping duplicate tag `{}` in {} directory.",
                entry.tag,
                directory.name()
            );
            table
                .errors
                .push(ExifFieldError::DuplicateTag { tag: entry.tag });
            continue;
        }

        match parse_value(&input.state, entry, index) {
            Ok(field) => {
                seen_tags.insert(field.tag());
                table.fields.push(field);
            }
            Err(e) => {
                log::warn!("Skipping field in {} directory. err: {e}", directory.name());
                table.errors.push(e);
            }
        }
    }
    log::trace!("Completed field parsing!");

    let next_ifd_location: NextIfdPointer = match u32::<_, EmptyError>(endianness).parse_next(input) {
        Ok(0_u32) => {
            log::trace!("There won't be a next IFD.");
            None
        }
        Ok(raw_location) => {
            log::trace!("Another IFD was detected! index: `{raw_location}`");
            Some(raw_location)
        }
        Err(_) => {
            log::warn!(
                "{} directory didn't contain a pointer to the next IFD. Assuming none.",
                directory.name()
            );
            None
        }
    };

    Ok((table, next_ifd_location))
}

#[cfg(test)]
mod tests {
    use tiff_meta_types::exif::{Endianness, ifd::DirectoryType};
    use winnow::binary::Endianness as WinnowEndianness;

    use super::parse_ifd;
    use crate::{
        exif::{
            State, Stream,
            error::{ExifFatalError, ExifFieldError},
        },
        util::logger,
    };

    fn stream<'a>(blob: &'a [u8]) -> Stream<'a> {
        Stream {
            input: blob,
            state: State {
                directory: DirectoryType::Root,
                endianness: Endianness::Little,
                winnow_endianness: WinnowEndianness::Little,
                blob,
            },
        }
    }

    fn entry(bytes: &mut Vec<u8>, tag: u16, ty: u16, count: u32, slot: u32) {
        bytes.extend_from_slice(tag.to_le_bytes().as_slice());
        bytes.extend_from_slice(ty.to_le_bytes().as_slice());
        bytes.extend_from_slice(count.to_le_bytes().as_slice());
        bytes.extend_from_slice(slot.to_le_bytes().as_slice());
    }

    #[test]
    fn zero_entries_is_fine() {
        logger();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(0_u16.to_le_bytes().as_slice());
        bytes.extend_from_slice(0_u32.to_le_bytes().as_slice());

        let (table, next) = parse_ifd(&mut stream(&bytes)).unwrap();
        assert!(table.fields.is_empty());
        assert!(table.errors.is_empty());
        assert_eq!(next, None);
    }

    #[test]
    fn bad_entries_are_skipped_and_recorded() {
        logger();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(4_u16.to_le_bytes().as_slice());
        entry(&mut bytes, 256, 3, 1, 640);
        entry(&mut bytes, 257, 99, 1, 480); // unknown type
        entry(&mut bytes, 256, 3, 1, 1); // duplicate
        entry(&mut bytes, 270, 2, 40, 5000); // out of bounds
        bytes.extend_from_slice(1234_u32.to_le_bytes().as_slice());

        let (table, next) = parse_ifd(&mut stream(&bytes)).unwrap();
        assert_eq!(table.entry_count, 4);
        assert_eq!(table.fields.len(), 1);
        assert_eq!(table.fields[0].as_i32(), Ok(640));
        assert_eq!(
            table.errors,
            vec![
                ExifFieldError::FieldUnknownType { tag: 257, got: 99 },
                ExifFieldError::DuplicateTag { tag: 256 },
                ExifFieldError::OffsetTooFar {
                    tag: 270,
                    offset: 5000,
                    len: 40
                },
            ]
        );
        assert_eq!(next, Some(1234));
    }

    #[test]
    fn unreadable_entry_leaves_its_tag_free() {
        logger();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(3_u16.to_le_bytes().as_slice());
        entry(&mut bytes, 271, 2, 40, 5000); // out of bounds
        entry(&mut bytes, 271, 2, 4, u32::from_le_bytes(*b"Fuj\0"));
        entry(&mut bytes, 271, 2, 4, u32::from_le_bytes(*b"Oly\0")); // duplicate
        bytes.extend_from_slice(0_u32.to_le_bytes().as_slice());

        let (table, _) = parse_ifd(&mut stream(&bytes)).unwrap();
        assert_eq!(table.fields.len(), 1);
        assert_eq!(table.fields[0].as_string(), Ok(Some("Fuj".into())));
        assert_eq!(
            table.errors,
            vec![
                ExifFieldError::OffsetTooFar {
                    tag: 271,
                    offset: 5000,
                    len: 40
                },
                ExifFieldError::DuplicateTag { tag: 271 },
            ]
        );
    }

    #[test]
    fn truncated_table_fails_the_directory() {
        logger();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(3_u16.to_le_bytes().as_slice());
        entry(&mut bytes, 256, 3, 1, 640);

        assert_eq!(
            parse_ifd(&mut stream(&bytes)).map(|_| ()),
            Err(ExifFatalError::IfdTruncated {
                directory: DirectoryType::Root,
                entry_count: 3
            })
        );
    }

    #[test]
    fn missing_next_pointer_means_no_next() {
        logger();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(1_u16.to_le_bytes().as_slice());
        entry(&mut bytes, 256, 3, 1, 640);

        let (_, next) = parse_ifd(&mut stream(&bytes)).unwrap();
        assert_eq!(next, None);
    }
}
