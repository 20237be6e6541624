use core::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;
use winnow::{
    Parser,
    binary::{be_u16, u8},
    error::EmptyError,
    token::take,
};

use crate::MaybeParsedExif;

use super::{EXIF_SIG, Jpeg, JpegConstructionError};

/// The marker code of `APP0`, where JFIF lives.
pub(super) const APP0_MARKER_CODE: u8 = 0xE0;

/// A marker code indicating that an APP1 marker is present.
pub(super) const APP1_MARKER_CODE: u8 = 0xE1;

/// The first marker code, `SOI` (start of image).
const SOI_MARKER_CODE: u8 = 0xD8;

/// The last marker code, `EOI` (end of image).
const EOI_MARKER_CODE: u8 = 0xD9;

/// The start of scan code, `SOS`.
const SOS_MARKER_CODE: u8 = 0xDA;

/// A part of a JPEG file.
enum Marker {
    /// A marker with no data.
    Standalone {
        /// An identifier for a marker.
        marker_code: u8,
    },

    /// A marker with a payload and length.
    Full {
        /// An identifier for a marker.
        marker_code: u8,

        /// The length of the marker's payload.
        ///
        /// This value does NOT include the two length bytes.
        len: u16,
    },
}

/// Whether the input starts with `SOI` followed by another marker.
pub fn magic_number(input: &[u8]) -> bool {
    input.starts_with(&[0xFF, SOI_MARKER_CODE, 0xFF])
}

/// Walks a JPEG file's markers, noting where its Exif segment is.
pub fn parse(file: &[u8]) -> Result<Jpeg<'_>, JpegConstructionError> {
    let input: &mut &[u8] = &mut &*file;
    let position = |input: &[u8]| file.len() - input.len();

    // take first marker, which should be `SOI`
    match marker(input)? {
        Marker::Standalone { marker_code } if marker_code == SOI_MARKER_CODE => (),
        Marker::Standalone { marker_code } | Marker::Full { marker_code, .. } => {
            log::error!(
                "The first marker of a JPEG file should be `SOI`, \
                but it wasn't! \
                got: `{marker_code:x?}`"
            );
            return Err(JpegConstructionError::FirstMarkerWasNotSoi { marker_code });
        }
    };

    // new Exif goes after `SOI` and any JFIF segments right behind it
    let mut insert_at: usize = position(*input);
    let mut in_leading_app0s: bool = true;
    let mut exif_segment: Option<(Range<usize>, Vec<u8>)> = None;

    // loop until the end of the file.
    'markers: while !input.is_empty() {
        let marker_start: usize = position(*input);
        let marker: Marker = marker(input)?;

        match marker {
            // handle end of image
            Marker::Standalone { marker_code } if marker_code == EOI_MARKER_CODE => {
                log::trace!("EOI detected! Stopping loop.");
                break;
            }

            // skip other standalone markers
            Marker::Standalone { marker_code } => {
                // note: we don't actually skip anything since we've already
                // consumed the marker code bytes lol
                log::trace!("Got standalone marker with code `{marker_code:x?}`. Skipping...");
                in_leading_app0s = false;
            }

            // for the `SOS` marker, we have to consume tokens until we reach
            // the next marker.
            //
            // however, our generic handling won't work for that! we gotta do
            // it w/ special treatment.
            Marker::Full { marker_code, len } if marker_code == SOS_MARKER_CODE => {
                in_leading_app0s = false;
                payload(input, marker_code, len)?;

                loop {
                    // grab the next two tokens
                    let Ok::<_, EmptyError>((_, pair)) = take(2_usize).parse_peek(*input) else {
                        log::warn!("Scan data ran to the end of the file without an `EOI`.");
                        break 'markers;
                    };
                    let (a, b) = (pair[0], pair[1]);

                    // if the first byte isn't 0xFF, or it's a stuffed `0xFF 0x00`,
                    // or a restart marker, keep looking.
                    //
                    // otherwise, it's a new marker!
                    if a != 0xFF || b == 0x00 || (0xD0..=0xD7).contains(&b) {
                        let rest: &[u8] = *input;
                        *input = &rest[1..];
                        continue;
                    }

                    break;
                }
            }

            // check "full" markers to see if it's a marker we care abt
            Marker::Full { marker_code, len } => {
                log::trace!("Got full marker! code: `{marker_code:x?}`, len: `{len}`");
                let payload: &[u8] = payload(input, marker_code, len)?;

                if marker_code == APP0_MARKER_CODE && in_leading_app0s {
                    insert_at = position(*input);
                } else {
                    in_leading_app0s = false;
                }

                if marker_code == APP1_MARKER_CODE
                    && let Some(blob) = payload.strip_prefix(EXIF_SIG)
                {
                    log::trace!("Found Exif in JPEG!");

                    if exif_segment.is_none() {
                        exif_segment = Some((marker_start..position(*input), blob.to_vec()));
                    } else {
                        log::warn!("Found more than one Exif payload in JPEG. Using the first.");
                    }
                }
            }
        }
    }

    let (exif_range, exif) = match exif_segment {
        Some((range, blob)) => (Some(range), Some(MaybeParsedExif::Raw(blob))),
        None => (None, None),
    };

    Ok(Jpeg {
        file,
        exif_segment: exif_range,
        insert_at,
        exif: Arc::new(RwLock::new(exif)),
    })
}

/// Takes a marker's payload.
fn payload<'i>(
    input: &mut &'i [u8],
    marker_code: u8,
    len: u16,
) -> Result<&'i [u8], JpegConstructionError> {
    let remaining_input_len: u64 = input.len() as u64;

    take(len as usize)
        .parse_next(input)
        .map_err(|_: EmptyError| {
            log::error!(
                "Attempted to parse payload from JPEG marker, \
                but ran out of data. \
                marker code: `{marker_code:x?}`, len: `{len}` bytes, \
                remaining input len: `{remaining_input_len}` bytes"
            );
            JpegConstructionError::NoDataForPayload {
                marker_code,
                len,
                remaining_input_len,
            }
        })
}

fn marker(input: &mut &[u8]) -> Result<Marker, JpegConstructionError> {
    // each marker must begin with one `0xFF` byte.
    //
    // let's see if that happened...
    let first_marker_byte: u8 = u8.parse_next(input).map_err(|_: EmptyError| {
        log::error!("Failed to get first marker byte!");
        JpegConstructionError::NoMarkerCode
    })?;
    if first_marker_byte != 0xFF {
        log::error!("JPEG marker's first byte was wrong.");
        return Err(JpegConstructionError::FirstMarkerByteWasWrong(
            first_marker_byte,
        ));
    }

    // a marker may have any number of `0xFF`/255 bytes before its code.
    //
    // try to find its code
    let marker_code: u8 = loop {
        let k: u8 = u8.parse_next(input).map_err(|_: EmptyError| {
            log::error!("Failed to parse out marker byte!");
            JpegConstructionError::NoMarkerCode
        })?;

        if k != 0xFF {
            break k;
        }
    };

    // then, parse the code
    if marker_code == 0 {
        log::error!(
            "This JPEG marker byte was `0`, but that value is disallowed."
        );
        return Err(JpegConstructionError::MarkerCodeDisallowed(marker_code));
    }

    // some markers are "standalone" markers and don't have any payload (or
    // the length of that payload).
    //
    // for that reason, early return if we encounter one...
    const STANDALONE_MARKERS: &[u8] = &[
        0xD0, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0x01,
    ];
    if STANDALONE_MARKERS.contains(&marker_code) {
        return Ok(Marker::Standalone { marker_code });
    }

    // alright, we've taken care of any standalone markers.
    //
    // let's check the length of the payload, then return
    let original_len: u16 = be_u16.parse_next(input).map_err(|_: EmptyError| {
        log::error!("Failed to find `u16` length byte pair when parsing marker.");
        JpegConstructionError::NoLength { marker_code }
    })?;

    // subtract 2 bytes from that (b/c the length includes its own bytes lol)
    let len: u16 =
        original_len
            .checked_sub(2_u16)
            .ok_or(JpegConstructionError::NegativeLength {
                marker_code,
                original_len,
            })?;

    Ok(Marker::Full { marker_code, len })
}
