//! # Providers
//!
//! Providers represent a source of metadata: a media file format such as
//! TIFF, JPEG, or PNG.
//!
//! Each provider has a struct with a [`MetadataProvider`] implementation.
//! This allows a consistent interface for obtaining metadata from different
//! media sources, and for putting new metadata back in.
//!
//! Rewriting never re-encodes a file. Instead, each provider says which
//! byte ranges to replace (a list of [`Splice`]s), and everything else is
//! copied over untouched.

use core::ops::Range;

use crate::{
    magic_number::AnyProvider,
    write::{OutputSet, WriteError},
};

pub mod jpeg;
pub mod png;
pub mod tiff;

/// One byte range of the original file, and what replaces it.
///
/// An empty range inserts `replacement` at that position.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Splice {
    pub range: Range<usize>,
    pub replacement: Vec<u8>,
}

impl Splice {
    pub fn replace(range: Range<usize>, replacement: Vec<u8>) -> Self {
        Self { range, replacement }
    }

    pub fn insert(at: usize, replacement: Vec<u8>) -> Self {
        Self {
            range: at..at,
            replacement,
        }
    }
}

/// Copies `original`, swapping in each splice's replacement.
///
/// Splices may be given in any order, but can't overlap or reach past the
/// end of `original`.
pub fn apply_splices(original: &[u8], splices: &[Splice]) -> Result<Vec<u8>, RewriteError> {
    let mut sorted: Vec<&Splice> = splices.iter().collect();
    sorted.sort_by_key(|s| (s.range.start, s.range.end));

    let grown: usize = splices.iter().map(|s| s.replacement.len()).sum();
    let mut out: Vec<u8> = Vec::with_capacity(original.len() + grown);
    let mut copied_up_to: usize = 0;

    for splice in sorted {
        let Range { start, end } = splice.range;
        if start < copied_up_to || end < start || end > original.len() {
            log::error!(
                "Splice `{start}..{end}` overlaps another or falls outside the file (len: `{}`).",
                original.len()
            );
            return Err(RewriteError::BadSplice {
                range: splice.range.clone(),
            });
        }

        out.extend_from_slice(&original[copied_up_to..start]);
        out.extend_from_slice(&splice.replacement);
        copied_up_to = end;
    }

    out.extend_from_slice(&original[copied_up_to..]);
    Ok(out)
}

/// Rewrites any supported file with new Exif metadata.
///
/// The format is found through the file's magic number.
pub fn rewrite_exif_lossless(file: &[u8], set: &OutputSet) -> Result<Vec<u8>, RewriteError> {
    let Some(provider) = AnyProvider::new(file) else {
        log::error!("File isn't in a supported format (len: `{}`).", file.len());
        return Err(RewriteError::MalformedContainer { format: None });
    };

    provider.update_exif_lossless(set)
}

/// Something stopped a lossless rewrite.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RewriteError {
    /// The file isn't a well-formed file of any supported format.
    ///
    /// `format` is set when the magic number matched, but the structure
    /// behind it didn't make sense.
    MalformedContainer {
        format: Option<crate::MagicNumber>,
    },

    /// The new metadata is too big for the container's segment.
    SegmentTooLarge { len: u64, max: u64 },

    /// Splices overlapped or went past the end of the file.
    BadSplice { range: Range<usize> },

    /// The new metadata couldn't be serialized.
    Write(WriteError),
}

impl core::fmt::Display for RewriteError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MalformedContainer { format: Some(format) } => {
                write!(f, "The file looked like {format:?}, but its structure was malformed.")
            }
            Self::MalformedContainer { format: None } => {
                f.write_str("The file isn't in any supported format.")
            }
            Self::SegmentTooLarge { len, max } => write!(
                f,
                "New metadata segment is `{len}` bytes, but the container allows at most `{max}`."
            ),
            Self::BadSplice { range } => write!(
                f,
                "Splice `{}..{}` overlaps another or falls outside the file.",
                range.start, range.end
            ),
            Self::Write(e) => write!(f, "Couldn't serialize the new metadata. err: {e}"),
        }
    }
}

impl From<WriteError> for RewriteError {
    fn from(value: WriteError) -> Self {
        Self::Write(value)
    }
}

impl core::error::Error for RewriteError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Write(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use tiff_meta_types::exif::Endianness;

    use super::{RewriteError, Splice, apply_splices, rewrite_exif_lossless};
    use crate::{util::logger, write::OutputSet};

    #[test]
    fn splices_apply_in_order() {
        logger();

        let original = b"0123456789";
        let out = apply_splices(
            original,
            &[
                Splice::insert(10, b"END".to_vec()),
                Splice::replace(2..4, b"ab".to_vec()),
                Splice::insert(0, b">".to_vec()),
                Splice::replace(6..9, Vec::new()),
            ],
        )
        .unwrap();

        assert_eq!(out, b">01ab459END".to_vec());
    }

    #[test]
    fn overlapping_splices_are_rejected() {
        logger();

        assert_eq!(
            apply_splices(
                b"0123456789",
                &[
                    Splice::replace(2..5, Vec::new()),
                    Splice::replace(4..6, Vec::new())
                ]
            ),
            Err(RewriteError::BadSplice { range: 4..6 })
        );
        assert_eq!(
            apply_splices(b"0123", &[Splice::insert(5, Vec::new())]),
            Err(RewriteError::BadSplice { range: 5..5 })
        );
    }

    #[test]
    fn empty_and_unknown_files_are_malformed() {
        logger();

        let set = OutputSet::new(Endianness::Little);
        assert_eq!(
            rewrite_exif_lossless(&[], &set),
            Err(RewriteError::MalformedContainer { format: None })
        );
        assert_eq!(
            rewrite_exif_lossless(b"GIF89a......", &set),
            Err(RewriteError::MalformedContainer { format: None })
        );
    }
}
