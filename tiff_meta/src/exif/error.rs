use tiff_meta_types::exif::{ifd::DirectoryType, primitives::FieldType};

/// This type describes the parsing result.
///
/// In summary, if it's the `Err` variant, the parsing failed completely, and
/// you aren't getting any Exif data at all.
///
/// `Ok` means that parsing largely succeeded, but some entries may have been
/// skipped. Those are listed on each directory; see
/// [`Directory::errors`](crate::exif::Directory::errors).
pub type ExifFatalResult<T> = Result<T, ExifFatalError>;

/// Something went wrong with the blob's header or a whole directory.
///
/// When this happens to IFD 0, the blob can't be read at all. For any other
/// directory, the directory is dropped and decoding carries on.
#[derive(Clone, Debug, PartialEq, PartialOrd, Eq, Hash)]
pub enum ExifFatalError {
    /// The input was too short to provide a byte order marker.
    NoByteOrderMarker { len: usize },

    /// The byte order marker was weird - it's not one of the two expected
    /// values (in ASCII, should be either `II` or `MM`).
    WeirdByteOrderMarker { found: [u8; 2] },

    /// Didn't find the TIFF magic number.
    NoTiffMagicNumber,

    /// The magic number indexes had a weird value. It's not TIFF's.
    MagicNumberWasntTiff { found: u16 },

    /// No TIFF header offset was found.
    NoTiffHeaderOffset,

    /// The header offset would place us inside the header.
    HeaderOffsetBeforeHeader { offset: u32 },

    /// A directory was said to start outside the blob.
    DirectoryOutOfBounds {
        directory: DirectoryType,
        offset: u32,
        blob_len: usize,
    },

    /// We've already read a directory at this offset.
    DirectoryLoop { directory: DirectoryType, offset: u32 },

    /// The directory didn't say how many entries it has.
    IfdNoEntryCount { directory: DirectoryType },

    /// The directory's entry table ran past the end of the blob.
    IfdTruncated {
        directory: DirectoryType,
        entry_count: u16,
    },
}

impl core::fmt::Display for ExifFatalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoByteOrderMarker { len } => {
                write!(f, "No byte order marker was found. len: `{len}`")
            }
            Self::WeirdByteOrderMarker { found } => match core::str::from_utf8(found.as_slice()) {
                Ok(found_utf8_bom) => {
                    write!(f, "Got a weird byte-order marker: `{found_utf8_bom}`")
                }
                Err(_) => write!(f, "Got a weird byte-order marker - wasn't ASCII: {found:?}"),
            },
            Self::NoTiffMagicNumber => {
                f.write_str("No TIFF magic number found - the slice was likely cut short.")
            }
            Self::MagicNumberWasntTiff { found } => {
                write!(f, "Magic number was not TIFF! got: `{found}`")
            }
            Self::NoTiffHeaderOffset => f.write_str("No TIFF header offset was found."),
            Self::HeaderOffsetBeforeHeader { offset } => write!(
                f,
                "TIFF header offset asked us to move into the header. Likely a \
                broken file - cannot continue parsing. offset: `{offset}`"
            ),
            Self::DirectoryOutOfBounds {
                directory,
                offset,
                blob_len,
            } => write!(
                f,
                "The {} directory was placed outside the blob. \
                offset: `{offset}`, blob len: `{blob_len}`",
                directory.name()
            ),
            Self::DirectoryLoop { directory, offset } => write!(
                f,
                "The {} directory points back at an already-read directory. \
                offset: `{offset}`",
                directory.name()
            ),
            Self::IfdNoEntryCount { directory } => write!(
                f,
                "The {} directory didn't say how many entries it has.",
                directory.name()
            ),
            Self::IfdTruncated {
                directory,
                entry_count,
            } => write!(
                f,
                "The {} directory's `{entry_count}` entries run past the end of the blob.",
                directory.name()
            ),
        }
    }
}

/// A single directory entry couldn't be read, so it was skipped.
#[derive(Clone, Debug, PartialEq, PartialOrd, Eq, Hash)]
pub enum ExifFieldError {
    /// Encountered an unknown type while parsing an entry.
    FieldUnknownType { tag: u16, got: u16 },

    /// The entry's value would be stored outside the blob.
    OffsetTooFar { tag: u16, offset: u32, len: u64 },

    /// Another entry in this directory already used this tag.
    DuplicateTag { tag: u16 },
}

impl core::fmt::Display for ExifFieldError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExifFieldError::FieldUnknownType { tag, got } => write!(
                f,
                "Encountered an unknown type while parsing a field! tag: `{tag}`, got: `{got}`"
            ),
            ExifFieldError::OffsetTooFar { tag, offset, len } => write!(
                f,
                "Field's value is stored outside the blob. \
                tag: `{tag}`, offset: `{offset}`, len: `{len}`"
            ),
            ExifFieldError::DuplicateTag { tag } => {
                write!(f, "Found a second field with the same tag. tag: `{tag}`")
            }
        }
    }
}

/// A field's value couldn't be turned into what was asked for.
#[derive(Clone, Debug, PartialEq, PartialOrd, Eq, Hash)]
pub enum FieldValueError {
    /// The field's type can't be read in the requested way.
    UnsupportedType {
        ty: FieldType,
        wanted: &'static str,
    },

    /// The raw bytes are shorter than `count * width`.
    Truncated {
        ty: FieldType,
        count: u32,
        available: usize,
    },

    /// The value has a different shape than the one requested.
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// There's no value at all.
    MissingValue,
}

impl core::fmt::Display for FieldValueError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnsupportedType { ty, wanted } => write!(
                f,
                "Can't read a field of type `{}` as {wanted}.",
                ty.name()
            ),
            Self::Truncated {
                ty,
                count,
                available,
            } => write!(
                f,
                "Field of type `{}` needs `{count}` elements, but only `{available}` bytes are present.",
                ty.name()
            ),
            Self::TypeMismatch { expected, found } => {
                write!(f, "Expected {expected}, but the value is {found}.")
            }
            Self::MissingValue => f.write_str("The field has no value."),
        }
    }
}

impl core::error::Error for ExifFatalError {}
impl core::error::Error for ExifFieldError {}
impl core::error::Error for FieldValueError {}
