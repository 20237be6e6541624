//! JPEG is an older image format designed with old-school compression in mind.
//!
//! It uses an unfortunate internal structure that's difficult to parse and
//! edit, so this crate treads lightly.
//!
//! Exif lives in an `APP1` segment whose payload starts with `Exif\0\0`.
//! Rewriting replaces that one segment, or inserts a new one right after
//! `SOI` (and any JFIF `APP0` segments) when the file had none.

use core::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    MaybeParsedExif, MetadataProvider, MetadataProviderRaw,
    providers::{RewriteError, Splice},
    write::OutputSet,
};

mod error;
mod parse;

pub use error::JpegConstructionError;

/// The signature in front of an `APP1` Exif payload.
pub(super) const EXIF_SIG: &[u8] = b"Exif\0\0";

/// The largest payload a JPEG segment can hold, signature included.
///
/// A segment's length field is a `u16` that counts its own two bytes.
pub const JPEG_MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

/// A JPEG file.
#[derive(Clone, Debug)]
pub struct Jpeg<'file> {
    file: &'file [u8],

    /// The whole Exif segment, from its marker to the end of its payload.
    exif_segment: Option<Range<usize>>,

    /// Where a new Exif segment goes when there isn't one yet.
    insert_at: usize,

    exif: Arc<RwLock<Option<MaybeParsedExif>>>,
}

impl MetadataProviderRaw for Jpeg<'_> {
    fn exif_raw(&self) -> Arc<RwLock<Option<MaybeParsedExif>>> {
        Arc::clone(&self.exif)
    }
}

impl<'file> MetadataProvider<'file> for Jpeg<'file> {
    type ConstructionError = JpegConstructionError;

    fn magic_number(input: &[u8]) -> bool {
        parse::magic_number(input)
    }

    fn new(
        input: &'file [u8],
    ) -> Result<Self, <Self as MetadataProvider<'file>>::ConstructionError> {
        parse::parse(input)
    }

    fn file(&self) -> &'file [u8] {
        self.file
    }

    fn exif_splices(&self, set: &OutputSet) -> Result<Vec<Splice>, RewriteError> {
        let blob: Vec<u8> = set.serialize()?;

        let payload_len: usize = EXIF_SIG.len() + blob.len();
        if payload_len > JPEG_MAX_SEGMENT_PAYLOAD {
            log::error!(
                "Exif won't fit in a JPEG segment. \
                payload len: `{payload_len}`, max: `{JPEG_MAX_SEGMENT_PAYLOAD}`"
            );
            return Err(RewriteError::SegmentTooLarge {
                len: payload_len as u64,
                max: JPEG_MAX_SEGMENT_PAYLOAD as u64,
            });
        }

        // the length field counts itself
        let len_field: u16 = (payload_len + 2) as u16;

        let mut segment: Vec<u8> = Vec::with_capacity(payload_len + 4);
        segment.extend_from_slice(&[0xFF, parse::APP1_MARKER_CODE]);
        segment.extend_from_slice(&len_field.to_be_bytes());
        segment.extend_from_slice(EXIF_SIG);
        segment.extend_from_slice(&blob);

        Ok(vec![match &self.exif_segment {
            Some(range) => {
                log::trace!("Replacing Exif segment at `{range:?}`.");
                Splice::replace(range.clone(), segment)
            }
            None => {
                log::trace!("No Exif segment yet. Inserting one at `{}`.", self.insert_at);
                Splice::insert(self.insert_at, segment)
            }
        }])
    }
}
