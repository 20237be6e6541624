//! Exif is a media metadata format primarily used by cameras.
//!
//! It's stored as a TIFF structure: a small header, then a graph of image
//! file directories (IFDs). Each directory holds entries with a tag ID, a
//! primitive type, and a count saying how many primitives are stored. That
//! means we can keep entries we don't understand - all without knowing how
//! they're structured.
//!
//! Decoding copies everything it needs out of the blob, so an [`Exif`] doesn't
//! borrow from the file it came from.

use rustc_hash::FxHashSet;
use tiff_meta_types::exif::tags::{
    JPEG_INTERCHANGE_FORMAT, JPEG_INTERCHANGE_FORMAT_LENGTH, KnownTag,
};
use winnow::{
    Parser as _, Stateful,
    binary::{Endianness as WinnowEndianness, u16, u32},
    error::EmptyError,
    token::take,
};

use self::{
    error::{ExifFatalError, ExifFatalResult},
    gps::GpsInfo,
    ifd::{Table, parse_ifd},
    typed::winnow_endianness,
};

pub use self::{
    error::FieldValueError,
    field::{Field, OversizedValue},
    ifd::{Directory, DirectoryId},
    typed::{DESCRIPTION_MAX_ELEMENTS, Number, TypedValue},
};
pub use tiff_meta_types::exif::{Endianness, ifd::DirectoryType, primitives::*};

pub mod error;
pub mod field;
pub mod gps;
pub mod ifd;
pub mod typed;
mod value;

/// Extracted information from an Exif metadata block.
///
/// Directories live in one list and refer to each other by [`DirectoryId`].
/// IFD 0 is always present.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Exif {
    endianness: Endianness,
    directories: Vec<Directory>,
    root: DirectoryId,
}

impl Exif {
    /// Parses the given Exif blob into our `Exif` structure.
    ///
    /// The blob starts at the TIFF header (`II*\0` or `MM\0*`).
    pub fn new(input: &mut &[u8]) -> ExifFatalResult<Self> {
        // we want to save the original slice ("blob") for absolute offsets
        let blob: &[u8] = *input;

        let (endianness, offset) = parse_header(input)?;
        Self::from_parts(blob, endianness, offset)
    }

    /// Decodes the directories of a blob whose header was already read.
    ///
    /// `blob` must still start at the TIFF header, since every offset is
    /// relative to it.
    pub fn from_parts(
        blob: &[u8],
        endianness: Endianness,
        first_ifd_offset: u32,
    ) -> ExifFatalResult<Self> {
        let mut decoder = Decoder {
            blob,
            endianness,
            directories: Vec::new(),
            visited: FxHashSet::default(),
        };

        // IFD 0 has to be readable. everything else is a bonus
        let (root, mut maybe_next_ifd_ptr) = decoder
            .read_directory(DirectoryType::Root, first_ifd_offset)
            .inspect_err(|e| {
                log::error!("Failed to parse Exif! The first IFD failed to parse! err: {e}")
            })?;
        log::trace!("Completed first IFD! ptr: {maybe_next_ifd_ptr:?}");

        // now, parse out each chained IFD
        let mut previous: DirectoryId = root;
        let mut chain_index: u16 = 1;
        while let Some(next_ifd_ptr) = maybe_next_ifd_ptr {
            log::trace!("At next IFD! index: `{next_ifd_ptr}`");

            match decoder.read_directory(DirectoryType::SubIfd(chain_index), next_ifd_ptr) {
                Ok((id, ptr)) => {
                    if let Some(prev) = decoder.directories.get_mut(previous.0) {
                        prev.next = Some(id);
                    }
                    previous = id;
                    maybe_next_ifd_ptr = ptr;
                }
                Err(e) => {
                    log::warn!("Stopping at IFD{chain_index}, which failed to parse. err: {e}");
                    break;
                }
            }

            let Some(n) = chain_index.checked_add(1) else {
                log::warn!("The IFD chain is too long. Ignoring the rest.");
                break;
            };
            chain_index = n;
        }

        Ok(Self {
            endianness,
            directories: decoder.directories,
            root,
        })
    }

    /// The byte order of the blob this came from.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// IFD 0.
    pub fn root(&self) -> &Directory {
        // `root` always indexes the first directory we read
        &self.directories[self.root.0]
    }

    pub fn root_id(&self) -> DirectoryId {
        self.root
    }

    /// Every directory, in the order they were discovered.
    pub fn directories(&self) -> &[Directory] {
        &self.directories
    }

    pub fn get(&self, id: DirectoryId) -> Option<&Directory> {
        self.directories.get(id.0)
    }

    /// Finds the first directory of this kind, starting from IFD 0.
    pub fn find_directory(&self, kind: DirectoryType) -> Option<&Directory> {
        self.find_directory_from(self.root, kind)
    }

    /// Finds a directory of this kind among `from` and everything reachable
    /// from it: children first, then the IFD chain.
    pub fn find_directory_from(&self, from: DirectoryId, kind: DirectoryType) -> Option<&Directory> {
        let mut stack: Vec<DirectoryId> = vec![from];

        while let Some(id) = stack.pop() {
            let Some(directory) = self.get(id) else {
                continue;
            };

            if directory.kind == kind {
                return Some(directory);
            }

            stack.extend(directory.next);
            stack.extend(directory.children.iter().rev().map(|(_, child)| *child));
        }

        None
    }

    /// Finds a field by directory kind and tag.
    pub fn find_field(&self, kind: DirectoryType, tag: u16) -> Option<&Field> {
        self.find_directory(kind)?.find_field(tag)
    }

    /// Reads the GPS coordinates, if they're all there.
    pub fn gps_info(&self) -> Result<Option<GpsInfo<'_>>, FieldValueError> {
        GpsInfo::from_directory(self.find_directory(DirectoryType::Gps))
    }
}

/// Builds up the directory list while walking the blob.
struct Decoder<'blob> {
    blob: &'blob [u8],
    endianness: Endianness,
    directories: Vec<Directory>,

    /// Offsets of every directory we've started reading.
    visited: FxHashSet<u32>,
}

impl<'blob> Decoder<'blob> {
    /// Reads one directory and everything hanging off its pointer tags.
    fn read_directory(
        &mut self,
        kind: DirectoryType,
        offset: u32,
    ) -> ExifFatalResult<(DirectoryId, NextIfdPointer)> {
        let blob: &'blob [u8] = self.blob;
        let Some(table_input) = blob.get(offset as usize..).filter(|s| !s.is_empty()) else {
            log::error!(
                "{} directory is outside the blob. offset: `{offset}`",
                kind.name()
            );
            return Err(ExifFatalError::DirectoryOutOfBounds {
                directory: kind,
                offset,
                blob_len: blob.len(),
            });
        };

        if !self.visited.insert(offset) {
            log::error!("{} directory loops back to offset `{offset}`.", kind.name());
            return Err(ExifFatalError::DirectoryLoop {
                directory: kind,
                offset,
            });
        }

        let stream = &mut Stream {
            input: table_input,
            state: State {
                directory: kind,
                endianness: self.endianness,
                winnow_endianness: winnow_endianness(self.endianness),
                blob,
            },
        };
        let (
            Table {
                entry_count,
                fields,
                errors,
            },
            next,
        ) = parse_ifd(stream)?;

        // find the pointers before the fields move into the list
        let pointers: Vec<(u16, DirectoryType, u32)> = fields
            .iter()
            .filter_map(|field| {
                let child = KnownTag::find(kind, field.tag())?.sub_directory()?;
                match field.as_i64().map(u32::try_from) {
                    Ok(Ok(ptr)) => Some((field.tag(), child, ptr)),
                    _ => {
                        log::warn!(
                            "Pointer to the {} directory wasn't a usable offset. Skipping it.",
                            child.name()
                        );
                        None
                    }
                }
            })
            .collect();

        let thumbnail: Option<Vec<u8>> = self.thumbnail(kind, &fields);

        let id = DirectoryId(self.directories.len());
        self.directories.push(Directory {
            kind,
            offset,
            entry_count,
            fields,
            children: Vec::new(),
            next: None,
            thumbnail,
            errors,
        });

        for (tag, child_kind, ptr) in pointers {
            match self.read_directory(child_kind, ptr) {
                Ok((child, child_next)) => {
                    if child_next.is_some() {
                        log::trace!("Ignoring next-IFD pointer of {} directory.", child_kind.name());
                    }
                    if let Some(parent) = self.directories.get_mut(id.0) {
                        parent.children.push((tag, child));
                    }
                }
                Err(e) => {
                    log::warn!("{} directory is missing. err: {e}", child_kind.name());
                }
            }
        }

        Ok((id, next))
    }

    /// Copies out an embedded JPEG thumbnail, if the directory points at one.
    fn thumbnail(&self, kind: DirectoryType, fields: &[Field]) -> Option<Vec<u8>> {
        if !kind.is_chained() {
            return None;
        }

        let find = |tag: u16| {
            fields
                .iter()
                .find(|f| f.tag() == tag)
                .and_then(|f| f.as_i64().ok())
        };
        let start: i64 = find(JPEG_INTERCHANGE_FORMAT)?;
        let len: i64 = find(JPEG_INTERCHANGE_FORMAT_LENGTH)?;

        let range = usize::try_from(start).ok()?..usize::try_from(start.checked_add(len)?).ok()?;
        match self.blob.get(range) {
            Some(bytes) => {
                log::trace!("Found `{len}` byte thumbnail in {}.", kind.name());
                Some(bytes.to_vec())
            }
            None => {
                log::warn!(
                    "Thumbnail in {} is outside the blob. start: `{start}`, len: `{len}`",
                    kind.name()
                );
                None
            }
        }
    }
}

/// Reads the TIFF header: byte order, magic number, and where IFD 0 is.
///
/// On success, `input` is left just past the header.
pub(crate) fn parse_header(input: &mut &[u8]) -> ExifFatalResult<(Endianness, u32)> {
    let blob: &[u8] = *input;

    // parse the endianness
    let endianness: Endianness = parse_blob_endianness(input)?;

    // alright. from here on out, we've got to account for the endianness
    // of everything.
    //
    // to do so, our input is wrapped in `Stateful`
    let stateful_input = &mut Stream {
        input: *input,
        state: State {
            directory: DirectoryType::Root,
            endianness,
            winnow_endianness: winnow_endianness(endianness),
            blob,
        },
    };

    // ensure we've got a TIFF marker (magic number)
    parse_tiff_magic_number(stateful_input)?;

    // grab the offset of IFD 0
    let offset: u32 = parse_tiff_header_offset(stateful_input)?;
    *input = stateful_input.input;

    Ok((endianness, offset))
}

/// Finds the endianness of the Exif blob.
fn parse_blob_endianness(input: &mut &[u8]) -> ExifFatalResult<Endianness> {
    let input_len: usize = input.len();

    // ensure we've got two good bytes
    log::trace!("Looking for the BOM bytes...");
    let two_ascii_bytes: &[u8] = take(2_usize)
        .parse_next(input)
        .map_err(|_: EmptyError| {
            log::error!("Couldn't find endianness marker!");
            ExifFatalError::NoByteOrderMarker { len: input_len }
        })?;

    // parse the bytes we found
    log::trace!("Grabbing BOM...");
    match two_ascii_bytes {
        [b'I', b'I'] => Ok(Endianness::Little).inspect(|f| log::trace!("It's LE: {f:?}")),
        [b'M', b'M'] => Ok(Endianness::Big).inspect(|f| log::trace!("It's BE: {f:?}")),

        // found a weird bom!
        &[a, b] => {
            let e = ExifFatalError::WeirdByteOrderMarker { found: [a, b] };
            log::error!("Couldn't parse out Exif! err: {e}");
            Err(e)
        }
        _ => Err(ExifFatalError::NoByteOrderMarker { len: input_len }),
    }
}

/*
*
*
*
  NOTE:

  all parsers from here on out generally require knowing the endianness. so,
  it's stored inside a custom state struct + a stream wrapper.

  this allows us to easily pass our state between pieces of the parser, all
  without globals or other nasty stuff
*
*
*
*
*/

#[derive(Clone, Copy, Debug)]
struct State<'a> {
    /// The kind of directory being read. Picks the tag table.
    directory: DirectoryType,
    endianness: Endianness,
    winnow_endianness: WinnowEndianness,
    blob: &'a [u8],
}

/// A stream of the blob wrapped with our endianness.
type Stream<'s> = Stateful<&'s [u8], State<'s>>;

/// Ensures we're working with the correct kind of file.
fn parse_tiff_magic_number(input: &mut Stream) -> ExifFatalResult<()> {
    // we account for endianness from here on out
    let endianness = input.state.winnow_endianness;

    // grab the magic number bytes as a u16
    log::trace!("Getting magic number...");
    let magic_number: u16 = u16(endianness)
        .parse_next(input)
        .map_err(|_: EmptyError| {
            log::error!("Couldn't find TIFF magic number!");
            ExifFatalError::NoTiffMagicNumber
        })?;

    // check the magic number
    log::trace!("Checking magic number...");
    if magic_number != 42 {
        log::error!("Magic number wasn't for TIFF. got: `{magic_number}`");
        return Err(ExifFatalError::MagicNumberWasntTiff {
            found: magic_number,
        });
    }

    log::trace!("Magic number was good!");
    Ok(())
}

/// Grabs the TIFF header offset: where IFD 0 starts, from the start of the
/// blob.
fn parse_tiff_header_offset(input: &mut Stream) -> ExifFatalResult<u32> {
    let endianness = input.state.winnow_endianness;

    let offset: u32 = u32(endianness)
        .parse_next(input)
        .map_err(|_: EmptyError| {
            log::error!("Didn't find a TIFF header offset!");
            ExifFatalError::NoTiffHeaderOffset
        })
        .inspect(|offset| log::trace!("found offset: `{offset}`"))?;

    if offset < 8 {
        log::error!("Exif blob placed IFD 0 inside the header! Can't continue parsing.");
        return Err(ExifFatalError::HeaderOffsetBeforeHeader { offset });
    }

    Ok(offset)
}

/// A pointer in the blob specifying the next IFD, if any.
type NextIfdPointer = Option<u32>;
