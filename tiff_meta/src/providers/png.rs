//! Contains a metadata provider for the PNG format.
//!
//! PNG files are a signature followed by a list of chunks. Each one is laid
//! out like so:
//!
//! - length (big-endian `u32`, data only)
//! - type (four ASCII letters)
//! - data
//! - CRC-32 of the type and data
//!
//! Exif lives in the `eXIf` chunk, as a bare TIFF blob.

use core::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;
use winnow::{Parser as _, binary::be_u32, error::EmptyError, token::take};

use crate::{
    MagicNumber, MaybeParsedExif, MetadataProvider, MetadataProviderRaw,
    providers::{RewriteError, Splice},
    write::OutputSet,
};

/// Every PNG starts with these bytes.
const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// The largest data length a PNG chunk may declare.
pub const PNG_MAX_CHUNK_LEN: usize = (1 << 31) - 1;

const EXIF_CHUNK: [u8; 4] = *b"eXIf";
const IDAT_CHUNK: [u8; 4] = *b"IDAT";
const IEND_CHUNK: [u8; 4] = *b"IEND";

/// PNG, or the Portable Network Graphics format, is a common image format as
/// of writing.
#[derive(Clone, Debug)]
pub struct Png<'file> {
    file: &'file [u8],

    /// The whole `eXIf` chunk, from its length to its CRC.
    exif_chunk: Option<Range<usize>>,

    /// Where the first `IDAT` chunk starts.
    first_idat: Option<usize>,

    exif: Arc<RwLock<Option<MaybeParsedExif>>>,
}

impl MetadataProviderRaw for Png<'_> {
    fn exif_raw(&self) -> Arc<RwLock<Option<MaybeParsedExif>>> {
        Arc::clone(&self.exif)
    }
}

impl<'file> MetadataProvider<'file> for Png<'file> {
    type ConstructionError = PngConstructionError;

    fn magic_number(input: &[u8]) -> bool {
        input.starts_with(SIGNATURE)
    }

    fn new(
        input: &'file [u8],
    ) -> Result<Self, <Self as MetadataProvider<'file>>::ConstructionError> {
        let file: &'file [u8] = input;
        let Some(mut input) = input.strip_prefix(SIGNATURE) else {
            log::error!("PNG signature was missing.");
            return Err(PngConstructionError::NoSignature);
        };
        let position = |input: &[u8]| file.len() - input.len();

        let mut exif_chunk: Option<Range<usize>> = None;
        let mut exif: Option<MaybeParsedExif> = None;
        let mut first_idat: Option<usize> = None;

        while !input.is_empty() {
            let start: usize = position(input);
            let chunk: Chunk = chunk(&mut input, start)?;
            let range: Range<usize> = start..position(input);
            log::trace!(
                "Found `{}` chunk at `{range:?}`.",
                String::from_utf8_lossy(&chunk.ty)
            );

            match chunk.ty {
                EXIF_CHUNK if exif_chunk.is_none() => {
                    if crc32(&[&chunk.ty, chunk.data]) != chunk.crc {
                        log::warn!("`eXIf` chunk has a bad CRC. Reading it anyway...");
                    }
                    exif_chunk = Some(range);
                    exif = Some(MaybeParsedExif::Raw(chunk.data.to_vec()));
                }
                EXIF_CHUNK => {
                    log::warn!("Found more than one `eXIf` chunk in PNG. Using the first.");
                }
                IDAT_CHUNK if first_idat.is_none() => first_idat = Some(start),
                IEND_CHUNK => {
                    log::trace!("Hit `IEND`. Stopping.");
                    break;
                }
                _ => (),
            }
        }

        Ok(Self {
            file,
            exif_chunk,
            first_idat,
            exif: Arc::new(RwLock::new(exif)),
        })
    }

    fn file(&self) -> &'file [u8] {
        self.file
    }

    fn exif_splices(&self, set: &OutputSet) -> Result<Vec<Splice>, RewriteError> {
        let blob: Vec<u8> = set.serialize()?;
        if blob.len() > PNG_MAX_CHUNK_LEN {
            log::error!(
                "Exif won't fit in a PNG chunk. len: `{}`, max: `{PNG_MAX_CHUNK_LEN}`",
                blob.len()
            );
            return Err(RewriteError::SegmentTooLarge {
                len: blob.len() as u64,
                max: PNG_MAX_CHUNK_LEN as u64,
            });
        }

        let mut chunk: Vec<u8> = Vec::with_capacity(blob.len() + 12);
        chunk.extend_from_slice(&(blob.len() as u32).to_be_bytes());
        chunk.extend_from_slice(&EXIF_CHUNK);
        chunk.extend_from_slice(&blob);
        chunk.extend_from_slice(&crc32(&[&EXIF_CHUNK, &blob]).to_be_bytes());

        let splice: Splice = match (&self.exif_chunk, self.first_idat) {
            (Some(range), _) => {
                log::trace!("Replacing `eXIf` chunk at `{range:?}`.");
                Splice::replace(range.clone(), chunk)
            }
            (None, Some(idat)) => {
                log::trace!("No `eXIf` chunk yet. Inserting one before `IDAT` at `{idat}`.");
                Splice::insert(idat, chunk)
            }
            (None, None) => {
                log::error!("PNG has no `IDAT` chunk to put `eXIf` in front of.");
                return Err(RewriteError::MalformedContainer {
                    format: Some(MagicNumber::Png),
                });
            }
        };

        Ok(vec![splice])
    }
}

/// One PNG chunk, borrowed from the file.
struct Chunk<'i> {
    ty: [u8; 4],
    data: &'i [u8],
    crc: u32,
}

/// Parses out one chunk, starting at `offset` in the file.
fn chunk<'i>(input: &mut &'i [u8], offset: usize) -> Result<Chunk<'i>, PngConstructionError> {
    let truncated = |_: EmptyError| {
        log::error!("PNG chunk at `{offset}` was cut short.");
        PngConstructionError::TruncatedChunk { offset }
    };

    let len: u32 = be_u32.parse_next(input).map_err(truncated)?;
    if len as usize > PNG_MAX_CHUNK_LEN {
        log::error!("PNG chunk at `{offset}` claims to be `{len}` bytes long.");
        return Err(PngConstructionError::ChunkTooLong { offset, len });
    }

    let ty: &[u8] = take(4_usize).parse_next(input).map_err(truncated)?;
    let data: &'i [u8] = take(len as usize).parse_next(input).map_err(truncated)?;
    let crc: u32 = be_u32.parse_next(input).map_err(truncated)?;

    Ok(Chunk {
        ty: [ty[0], ty[1], ty[2], ty[3]],
        data,
        crc,
    })
}

/// Computes the CRC-32 PNG uses over the given parts, one after another.
fn crc32(parts: &[&[u8]]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;

    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in parts.iter().flat_map(|part| part.iter()) {
        let mut cur = byte as u32;
        for _ in 0..8 {
            let bit = (crc ^ cur) & 1;
            crc >>= 1;
            if bit != 0 {
                crc ^= POLY;
            }
            cur >>= 1;
        }
    }

    !crc
}

/// Something went wrong while walking a PNG file's chunks.
#[derive(Clone, Debug, PartialEq, PartialOrd, Hash)]
pub enum PngConstructionError {
    /// The file didn't start with the PNG signature.
    NoSignature,

    /// A chunk ran past the end of the file.
    TruncatedChunk { offset: usize },

    /// A chunk's length was over the format's limit.
    ChunkTooLong { offset: usize, len: u32 },
}

impl core::fmt::Display for PngConstructionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoSignature => f.write_str("The PNG signature wasn't found."),
            Self::TruncatedChunk { offset } => {
                write!(f, "PNG chunk at `{offset}` ran out of data.")
            }
            Self::ChunkTooLong { offset, len } => write!(
                f,
                "PNG chunk at `{offset}` has length `{len}`, \
                but the most a chunk may hold is `{PNG_MAX_CHUNK_LEN}` bytes."
            ),
        }
    }
}

impl core::error::Error for PngConstructionError {}

#[cfg(test)]
mod tests {
    use tiff_meta_types::exif::{Endianness, ifd::DirectoryType, tags::RootTag};

    use super::{
        EXIF_CHUNK, PNG_MAX_CHUNK_LEN, Png, PngConstructionError, SIGNATURE, crc32,
    };
    use crate::{
        MagicNumber, MetadataProvider,
        exif::typed::{Number, TypedValue},
        providers::RewriteError,
        util::logger,
        write::OutputSet,
    };

    fn chunk(ty: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = (data.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(ty);
        out.extend_from_slice(data);
        out.extend_from_slice(&crc32(&[ty, data]).to_be_bytes());
        out
    }

    fn ihdr() -> Vec<u8> {
        chunk(
            b"IHDR",
            &[0, 0, 0, 1, 0, 0, 0, 1, 8, 2, 0, 0, 0], // 1x1, 8-bit RGB
        )
    }

    fn idat() -> Vec<u8> {
        chunk(b"IDAT", &[0x78, 0x9C, 0x63, 0x60, 0x60, 0x60, 0x00, 0x00])
    }

    fn iend() -> Vec<u8> {
        chunk(b"IEND", &[])
    }

    fn png(chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut out = SIGNATURE.to_vec();
        for c in chunks {
            out.extend_from_slice(c);
        }
        out
    }

    fn set_with_orientation(orientation: u16) -> OutputSet {
        let mut set = OutputSet::new(Endianness::Little);
        set.get_or_create_directory(DirectoryType::Root)
            .set_field(
                RootTag::Orientation.tag_id(),
                TypedValue::Scalar(Number::Short(orientation)),
            )
            .unwrap();
        set
    }

    #[test]
    fn crc_matches_known_chunks() {
        logger();

        // every `IEND` chunk ends with these bytes
        assert_eq!(crc32(&[b"IEND"]), 0xAE42_6082);
        assert_eq!(crc32(&[b"IE", b"ND"]), 0xAE42_6082);
    }

    #[test]
    fn png_without_exif() {
        logger();

        let file = png(&[ihdr(), idat(), iend()]);
        let png = Png::new(&file).unwrap();

        assert!(png.exif().is_none());
        assert_eq!(png.first_idat, Some(SIGNATURE.len() + ihdr().len()));
    }

    #[test]
    fn new_exif_goes_before_idat() {
        logger();

        let file = png(&[ihdr(), idat(), iend()]);
        let set = set_with_orientation(6);

        let out = Png::new(&file).unwrap().update_exif_lossless(&set).unwrap();
        let exif_chunk = chunk(&EXIF_CHUNK, &set.serialize().unwrap());
        assert_eq!(out, png(&[ihdr(), exif_chunk, idat(), iend()]));

        let rewritten = Png::new(&out).unwrap();
        let exif = rewritten.exif().unwrap().unwrap();
        assert_eq!(
            exif.find_field(DirectoryType::Root, RootTag::Orientation.tag_id())
                .unwrap()
                .as_i32(),
            Ok(6)
        );
    }

    #[test]
    fn existing_exif_is_replaced_and_stable() {
        logger();

        let old = chunk(&EXIF_CHUNK, &set_with_orientation(1).serialize().unwrap());
        let file = png(&[ihdr(), old, idat(), iend()]);

        let set = set_with_orientation(8);
        let once = Png::new(&file).unwrap().update_exif_lossless(&set).unwrap();
        let twice = Png::new(&once).unwrap().update_exif_lossless(&set).unwrap();

        let new = chunk(&EXIF_CHUNK, &set.serialize().unwrap());
        assert_eq!(once, png(&[ihdr(), new, idat(), iend()]));
        assert_eq!(once, twice);
    }

    #[test]
    fn bad_crc_still_reads() {
        logger();

        let mut exif_chunk = chunk(&EXIF_CHUNK, &set_with_orientation(3).serialize().unwrap());
        let last = exif_chunk.len() - 1;
        exif_chunk[last] ^= 0xFF;

        let file = png(&[ihdr(), exif_chunk, idat(), iend()]);
        let png = Png::new(&file).unwrap();
        assert!(png.exif().unwrap().is_ok());
    }

    #[test]
    fn no_idat_means_nowhere_to_insert() {
        logger();

        let file = png(&[ihdr(), iend()]);
        assert_eq!(
            Png::new(&file)
                .unwrap()
                .update_exif_lossless(&set_with_orientation(1)),
            Err(RewriteError::MalformedContainer {
                format: Some(MagicNumber::Png)
            })
        );
    }

    #[test]
    fn malformed_pngs_are_rejected() {
        logger();

        assert_eq!(
            Png::new(b"\x89PNG").unwrap_err(),
            PngConstructionError::NoSignature
        );

        let mut cut = png(&[ihdr(), idat()]);
        cut.truncate(cut.len() - 2);
        assert_eq!(
            Png::new(&cut).unwrap_err(),
            PngConstructionError::TruncatedChunk {
                offset: SIGNATURE.len() + ihdr().len()
            }
        );

        let mut huge = SIGNATURE.to_vec();
        huge.extend_from_slice(&u32::MAX.to_be_bytes());
        huge.extend_from_slice(b"IDAT");
        assert_eq!(
            Png::new(&huge).unwrap_err(),
            PngConstructionError::ChunkTooLong {
                offset: SIGNATURE.len(),
                len: u32::MAX
            }
        );
        assert!(u32::MAX as usize > PNG_MAX_CHUNK_LEN);
    }
}
