use tiff_meta_types::exif::{primitives::FieldType, tags::KnownTag};

use super::{State, error::ExifFieldError, field::Field};

/// The four parts of a 12-byte directory entry, before interpretation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct RawEntry {
    pub tag: u16,
    pub raw_type: u16,
    pub count: u32,

    /// The value/offset slot, read in the blob's byte order.
    pub slot: u32,
}

/// Turns one raw entry into a [`Field`], copying its value out of the blob.
pub(super) fn parse_value(
    state: &State,
    entry: RawEntry,
    index: usize,
) -> Result<Field, ExifFieldError> {
    let RawEntry {
        tag,
        raw_type,
        count,
        slot,
    } = entry;

    // make it into a type repr enum
    let ty: FieldType = FieldType::try_from(raw_type).map_err(|_| {
        log::error!("Encountered unknown field type: `{raw_type}` (tag: `{tag}`)");
        ExifFieldError::FieldUnknownType { tag, got: raw_type }
    })?;

    log::trace!(
        "(field info...
    tag: {tag},
    ty: {ty:?},
    count: {count},
    value or offset: {slot}
)"
    );

    // warn if the real type isn't an expected type
    if let Some(known_tag) = KnownTag::find(state.directory, tag)
        && !known_tag.types().contains(&ty)
    {
        log::warn!(
            "Field `{known_tag:?}` had a type mismatch! \
            Continuing parsing with wrong type anyway... \
            got: `{ty:?}`, \
            expected: {:?}",
            known_tag.types()
        );
    }

    // check how large the stored data is
    let total_size: u64 = ty.size_bytes() as u64 * count as u64;
    log::trace!("total size for field: `{total_size}`");

    // small values sit right in the slot. everything else is at an offset
    // from the start of the blob
    let raw: Vec<u8> = if total_size <= 4 {
        log::trace!("No value offset detected.");
        state.endianness.u32_bytes(slot)[..total_size as usize].to_vec()
    } else {
        log::trace!("Using reference to blob for value's absolute offset.");
        let too_far = || {
            log::error!(
                "Field said its data is stored outside the blob! \
                Can't continue parsing this field. \
                offset: `{slot}`, len: `{total_size}`, blob len: `{}`",
                state.blob.len()
            );
            ExifFieldError::OffsetTooFar {
                tag,
                offset: slot,
                len: total_size,
            }
        };

        let start: usize = slot as usize;
        let end: usize = usize::try_from(total_size)
            .ok()
            .and_then(|len| start.checked_add(len))
            .ok_or_else(too_far)?;

        state.blob.get(start..end).ok_or_else(too_far)?.to_vec()
    };

    Ok(Field::new(
        tag,
        state.directory,
        ty,
        count,
        slot,
        raw,
        state.endianness,
        i32::try_from(index).unwrap_or(i32::MAX),
    ))
}

#[cfg(test)]
mod tests {
    use tiff_meta_types::exif::{Endianness, ifd::DirectoryType, primitives::FieldType};
    use winnow::binary::Endianness as WinnowEndianness;

    use super::{RawEntry, parse_value};
    use crate::{
        exif::{
            State,
            error::ExifFieldError,
            typed::{Number, TypedValue},
        },
        util::logger,
    };

    fn state(blob: &[u8], endianness: Endianness) -> State<'_> {
        State {
            directory: DirectoryType::Root,
            endianness,
            winnow_endianness: match endianness {
                Endianness::Little => WinnowEndianness::Little,
                Endianness::Big => WinnowEndianness::Big,
            },
            blob,
        }
    }

    /// Unknown types should be rejected.
    #[test]
    fn unknown_type() {
        logger();

        let entry = RawEntry {
            tag: 0,
            raw_type: 0,
            count: 1,
            slot: 0,
        };

        assert_eq!(
            parse_value(&state(&[], Endianness::Little), entry, 0),
            Err(ExifFieldError::FieldUnknownType { tag: 0, got: 0 })
        );
    }

    /// We should accept a long, unknown field.
    #[test]
    fn long_field() {
        logger();

        let mut blob = vec![0_u8; 20];
        blob.extend_from_slice([61_u8; 300].as_slice());

        let field = parse_value(
            &state(&blob, Endianness::Little),
            RawEntry {
                tag: 666,
                raw_type: 1,
                count: 300,
                slot: 20,
            },
            4,
        )
        .unwrap();

        assert_eq!(field.tag(), 666);
        assert_eq!(field.sort_hint(), 4);
        assert_eq!(field.raw_bytes(), [61_u8; 300].as_slice());
        assert_eq!(field.value(), Ok(TypedValue::ByteArray(vec![61_u8; 300])));
    }

    #[test]
    fn value_past_the_end_is_rejected() {
        logger();

        let blob = vec![0_u8; 16];
        assert_eq!(
            parse_value(
                &state(&blob, Endianness::Big),
                RawEntry {
                    tag: 270,
                    raw_type: FieldType::Ascii.code(),
                    count: 10,
                    slot: 10,
                },
                0,
            ),
            Err(ExifFieldError::OffsetTooFar {
                tag: 270,
                offset: 10,
                len: 10
            })
        );
    }

    #[test]
    fn inline_values_keep_file_byte_order() {
        logger();

        for endianness in [Endianness::Big, Endianness::Little] {
            // a short stored in the first half of the slot
            let slot: u32 = endianness.read_u32([
                endianness.u16_bytes(1920)[0],
                endianness.u16_bytes(1920)[1],
                0,
                0,
            ]);

            let field = parse_value(
                &state(&[], endianness),
                RawEntry {
                    tag: 256,
                    raw_type: FieldType::Short.code(),
                    count: 1,
                    slot,
                },
                0,
            )
            .unwrap();

            assert_eq!(field.value(), Ok(TypedValue::Scalar(Number::Short(1920))));
            assert_eq!(field.raw_bytes().len(), 2);
        }
    }
}
