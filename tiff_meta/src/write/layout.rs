//! Turns an [`OutputSet`] into TIFF directory tables and their data.
//!
//! Everything is placed in one forward pass. Directory tables come first,
//! since their sizes only depend on entry counts. After them sits a data
//! region holding every value that doesn't fit in an entry, then each
//! directory's thumbnail. Values start on word boundaries.

use std::collections::{BTreeMap, BTreeSet};

use tiff_meta_types::exif::{
    Endianness,
    ifd::DirectoryType,
    primitives::FieldType,
    tags::{JPEG_INTERCHANGE_FORMAT, JPEG_INTERCHANGE_FORMAT_LENGTH, KnownTag, SUB_DIRECTORY_POINTERS},
};

use super::{OutputSet, error::WriteError};
use crate::exif::error::FieldValueError;

/// Size of a classic TIFF header: byte order, magic number, first offset.
pub const TIFF_HEADER_LEN: u32 = 8;

/// Whether the layout writes this tag itself, making any stored copy stale.
pub(crate) fn is_synthesized(kind: DirectoryType, tag: u16) -> bool {
    let thumbnail_tag = kind.is_chained()
        && (tag == JPEG_INTERCHANGE_FORMAT || tag == JPEG_INTERCHANGE_FORMAT_LENGTH);
    let pointer_tag = KnownTag::find(kind, tag).is_some_and(|k| k.sub_directory().is_some());

    thumbnail_tag || pointer_tag
}

enum Slot<'a> {
    /// Bytes of a stored field.
    Value(&'a [u8]),

    /// Offset of another directory's table.
    Pointer(DirectoryType),

    /// Offset of this directory's thumbnail.
    ThumbnailOffset,

    Long(u32),
}

struct Entry<'a> {
    tag: u16,
    field_type: FieldType,
    count: u32,
    sort_hint: i32,
    slot: Slot<'a>,
}

struct Plan<'a> {
    kind: DirectoryType,
    entries: Vec<Entry<'a>>,
    thumbnail: Option<&'a [u8]>,
}

impl Plan<'_> {
    fn table_len(&self) -> u64 {
        2 + 12 * self.entries.len() as u64 + 4
    }
}

/// What an entry's four-byte slot will hold, once known.
enum Resolved {
    Ready([u8; 4]),
    Thumbnail,
}

/// Lays out every directory of the set.
///
/// The returned bytes are meant to sit at `start` in the final blob, where
/// offset zero is the TIFF header. IFD 0's table is always at `start`.
pub(super) fn lay_out(set: &OutputSet, start: u64) -> Result<Vec<u8>, WriteError> {
    let endianness: Endianness = set.endianness();
    let plans: Vec<Plan> = plan(set)?;

    // tables first
    let mut table_offsets: BTreeMap<DirectoryType, u64> = BTreeMap::new();
    let mut cursor: u64 = start;
    for p in &plans {
        table_offsets.insert(p.kind, cursor);
        cursor += p.table_len();
    }
    let data_start: u64 = cursor;
    log::trace!(
        "Laid out `{}` directory tables. Data starts at `{data_start}`.",
        plans.len()
    );

    // then the data region
    let mut data: Vec<u8> = Vec::new();
    let mut resolved: Vec<Vec<Resolved>> = Vec::with_capacity(plans.len());
    for p in &plans {
        let mut slots: Vec<Resolved> = Vec::with_capacity(p.entries.len());

        for entry in &p.entries {
            slots.push(match entry.slot {
                Slot::Value(raw) if raw.len() <= 4 => {
                    let mut slot = [0_u8; 4];
                    slot[..raw.len()].copy_from_slice(raw);
                    Resolved::Ready(slot)
                }
                Slot::Value(raw) => {
                    let offset: u32 = offset32(data_start + data.len() as u64)?;
                    data.extend_from_slice(raw);
                    pad_to_word(&mut data, data_start);
                    Resolved::Ready(endianness.u32_bytes(offset))
                }
                Slot::Pointer(child) => {
                    let offset: u64 = table_offsets.get(&child).copied().unwrap_or_default();
                    Resolved::Ready(endianness.u32_bytes(offset32(offset)?))
                }
                Slot::Long(value) => Resolved::Ready(endianness.u32_bytes(value)),
                Slot::ThumbnailOffset => Resolved::Thumbnail,
            });
        }

        resolved.push(slots);
    }

    // thumbnails go last
    let mut thumbnail_offsets: Vec<Option<u32>> = Vec::with_capacity(plans.len());
    for p in &plans {
        thumbnail_offsets.push(match p.thumbnail {
            Some(thumbnail) => {
                let offset: u32 = offset32(data_start + data.len() as u64)?;
                data.extend_from_slice(thumbnail);
                pad_to_word(&mut data, data_start);
                Some(offset)
            }
            None => None,
        });
    }

    let end: u64 = data_start + data.len() as u64;
    if end > u32::MAX as u64 + 1 {
        log::error!("Output would end at `{end}`, which is past what TIFF can address.");
        return Err(WriteError::TooLarge { size: end });
    }

    // now every offset is known, so the tables can be written
    let mut out: Vec<u8> = Vec::with_capacity((end - start) as usize);
    for (index, p) in plans.iter().enumerate() {
        // checked while planning
        let entry_count: u16 = u16::try_from(p.entries.len()).unwrap_or(u16::MAX);
        out.extend_from_slice(&endianness.u16_bytes(entry_count));

        for (entry, slot) in p.entries.iter().zip(&resolved[index]) {
            out.extend_from_slice(&endianness.u16_bytes(entry.tag));
            out.extend_from_slice(&endianness.u16_bytes(entry.field_type.code()));
            out.extend_from_slice(&endianness.u32_bytes(entry.count));
            match slot {
                Resolved::Ready(bytes) => out.extend_from_slice(bytes),
                Resolved::Thumbnail => out.extend_from_slice(
                    &endianness.u32_bytes(thumbnail_offsets[index].unwrap_or_default()),
                ),
            }
        }

        // chained directories point at the next chained one
        let next: u64 = if p.kind.is_chained() {
            plans[index + 1..]
                .iter()
                .find(|later| later.kind.is_chained())
                .and_then(|later| table_offsets.get(&later.kind).copied())
                .unwrap_or(0)
        } else {
            0
        };
        out.extend_from_slice(&endianness.u32_bytes(offset32(next)?));
    }

    out.extend_from_slice(&data);
    Ok(out)
}

/// Decides which directories are written and what each one holds.
fn plan(set: &OutputSet) -> Result<Vec<Plan<'_>>, WriteError> {
    // IFD 0 is always written. other directories need content, or a
    // descendant that has some
    let mut kinds: BTreeSet<DirectoryType> = BTreeSet::from([DirectoryType::Root]);
    for dir in set.directories() {
        if dir.is_empty() {
            log::trace!("Skipping empty {} directory.", dir.kind().name());
            continue;
        }

        let mut kind: Option<DirectoryType> = Some(dir.kind());
        while let Some(k) = kind {
            kinds.insert(k);
            kind = k.parent();
        }
    }

    let mut plans: Vec<Plan> = Vec::with_capacity(kinds.len());
    for kind in kinds.iter().copied() {
        let dir = set.directory(kind);
        let mut entries: Vec<Entry> = Vec::new();

        for field in dir.map(|d| d.fields()).unwrap_or_default() {
            if is_synthesized(kind, field.tag()) {
                log::trace!("Dropping stale copy of tag `{}`.", field.tag());
                continue;
            }

            if field.raw_bytes().len() as u64 != field.byte_length() {
                log::error!(
                    "Field `{}` should have `{}` bytes, but has `{}`.",
                    field.tag(),
                    field.byte_length(),
                    field.raw_bytes().len()
                );
                return Err(FieldValueError::Truncated {
                    ty: field.field_type(),
                    count: field.count(),
                    available: field.raw_bytes().len(),
                }
                .into());
            }

            entries.push(Entry {
                tag: field.tag(),
                field_type: field.field_type(),
                count: field.count(),
                sort_hint: field.sort_hint(),
                slot: Slot::Value(field.raw_bytes()),
            });
        }

        for (parent, tag, child) in SUB_DIRECTORY_POINTERS.iter().copied() {
            if parent == kind && kinds.contains(&child) {
                entries.push(synthesized(tag, Slot::Pointer(child)));
            }
        }

        let thumbnail: Option<&[u8]> = dir.and_then(|d| d.thumbnail());
        if let Some(thumbnail) = thumbnail {
            let len: u32 = u32::try_from(thumbnail.len()).map_err(|_| {
                log::error!("Thumbnail is too large to describe in a `Long`.");
                WriteError::TooLarge {
                    size: thumbnail.len() as u64,
                }
            })?;

            entries.push(synthesized(JPEG_INTERCHANGE_FORMAT, Slot::ThumbnailOffset));
            entries.push(synthesized(JPEG_INTERCHANGE_FORMAT_LENGTH, Slot::Long(len)));
        }

        if entries.len() > u16::MAX as usize {
            log::error!(
                "{} directory has `{}` entries, but a table holds at most `{}`.",
                kind.name(),
                entries.len(),
                u16::MAX
            );
            return Err(WriteError::TooLarge {
                size: entries.len() as u64,
            });
        }

        entries.sort_by_key(|e| (e.tag, e.sort_hint));
        plans.push(Plan {
            kind,
            entries,
            thumbnail,
        });
    }

    Ok(plans)
}

fn synthesized(tag: u16, slot: Slot<'_>) -> Entry<'_> {
    Entry {
        tag,
        field_type: FieldType::Long,
        count: 1,
        sort_hint: 0,
        slot,
    }
}

fn pad_to_word(data: &mut Vec<u8>, data_start: u64) {
    if (data_start + data.len() as u64) % 2 == 1 {
        data.push(0);
    }
}

fn offset32(offset: u64) -> Result<u32, WriteError> {
    u32::try_from(offset).map_err(|_| {
        log::error!("Offset `{offset}` doesn't fit in 32 bits.");
        WriteError::TooLarge { size: offset }
    })
}
