//! TIFF files are Exif blobs themselves: the header and directories are the
//! file's own structure.
//!
//! Rewriting frees the bytes the old directories own: their tables, values
//! stored outside the tables, and thumbnails the new set carries over. The
//! new directories go into the first freed run they fit in, and freed bytes
//! they don't cover are zeroed. If no run is big enough, the directories go
//! at the end of the file instead.
//!
//! Image data (and anything else only pointed at) never moves.

use core::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;
use tiff_meta_types::exif::{
    Endianness,
    tags::{JPEG_INTERCHANGE_FORMAT, JPEG_INTERCHANGE_FORMAT_LENGTH, RootTag},
};

use crate::{
    MaybeParsed, MaybeParsedExif, MetadataProvider, MetadataProviderRaw, Wrapped,
    exif::{Directory, Exif, Field, error::ExifFatalError, parse_header},
    providers::{RewriteError, Splice},
    write::{OutputSet, WriteError},
};

/// Where the first-IFD offset sits in the header.
const FIRST_IFD_OFFSET_RANGE: Range<usize> = 4..8;

const HEADER_LEN: usize = 8;

/// Offset tags that locate image data, each with its byte-count tag.
const IMAGE_DATA_TAGS: [(u16, u16); 2] = [
    (
        RootTag::StripOffsets.tag_id(),
        RootTag::StripByteCounts.tag_id(),
    ),
    (
        RootTag::TileOffsets.tag_id(),
        RootTag::TileByteCounts.tag_id(),
    ),
];

/// A TIFF file.
#[derive(Clone, Debug)]
pub struct Tiff<'file> {
    file: &'file [u8],
    endianness: Endianness,

    /// Only ever holds the decoded directories. The raw blob is `file`.
    exif: Arc<RwLock<Option<MaybeParsedExif>>>,
}

impl Tiff<'_> {
    /// The file's byte order.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }
}

impl MetadataProviderRaw for Tiff<'_> {
    fn exif_raw(&self) -> Arc<RwLock<Option<MaybeParsedExif>>> {
        Arc::clone(&self.exif)
    }
}

impl<'file> MetadataProvider<'file> for Tiff<'file> {
    type ConstructionError = ExifFatalError;

    fn magic_number(input: &[u8]) -> bool {
        input.starts_with(b"II*\0") || input.starts_with(b"MM\0*")
    }

    fn new(
        input: &'file [u8],
    ) -> Result<Self, <Self as MetadataProvider<'file>>::ConstructionError> {
        let (endianness, first_ifd) = parse_header(&mut &*input)?;
        log::trace!("Found TIFF header. endianness: `{endianness:?}`, IFD 0 at: `{first_ifd}`");

        Ok(Self {
            file: input,
            endianness,
            exif: Arc::new(const { RwLock::new(None) }),
        })
    }

    fn file(&self) -> &'file [u8] {
        self.file
    }

    /// Decodes the directories straight out of the borrowed file.
    ///
    /// Only the decoded result is cached. A failed decode is retried on the
    /// next call.
    fn exif(&self) -> Option<Result<Arc<Exif>, ExifFatalError>> {
        if let Some(MaybeParsed::Parsed(p)) = &*self.exif.read() {
            log::trace!("Cached Exif found! Returning...");
            return Some(Ok(Arc::clone(&p.0)));
        }

        // someone may have parsed it while we waited for the lock
        let locked = &mut *self.exif.write();
        if let Some(MaybeParsed::Parsed(p)) = locked {
            return Some(Ok(Arc::clone(&p.0)));
        }

        match Exif::new(&mut &*self.file) {
            Ok(p) => {
                let wrapped: Wrapped<Exif> = Wrapped(Arc::new(p));
                log::trace!("Completed Exif parsing! Cached internally.");
                *locked = Some(MaybeParsed::Parsed(wrapped.clone()));
                Some(Ok(wrapped.0))
            }
            Err(e) => {
                log::error!("Failed to parse Exif! err: {e}");
                Some(Err(e))
            }
        }
    }

    fn exif_splices(&self, set: &OutputSet) -> Result<Vec<Splice>, RewriteError> {
        // the directories have to match the rest of the file
        let set: OutputSet = set
            .with_endianness(self.endianness)
            .map_err(WriteError::from)?;

        let file_len: usize = self.file.len();
        let freed: Vec<Range<usize>> = match self.exif() {
            Some(Ok(exif)) => reclaimable(&exif, &set, file_len),
            Some(Err(e)) => {
                log::warn!("Old directories are unreadable, so none of their space is reused. err: {e}");
                Vec::new()
            }
            None => Vec::new(),
        };

        // any even start gives the same length
        let len: usize = set.lay_out_at(0)?.len();

        // a run at the very end can grow past it
        let target: Option<Range<usize>> = freed
            .iter()
            .find(|run| run.end == file_len || word_align(run.start) + len <= run.end)
            .cloned();

        let start: usize = match &target {
            Some(run) => word_align(run.start),
            None => word_align(file_len),
        };
        let first_ifd: u32 = u32::try_from(start).map_err(|_| {
            log::error!("TIFF is too large to place directories at `{start}`.");
            WriteError::TooLarge { size: start as u64 }
        })?;
        let layout: Vec<u8> = set.lay_out_at(start as u64)?;
        log::trace!(
            "Placing `{}` bytes of directories at `{start}`. Freed runs: `{freed:?}`",
            layout.len()
        );

        let mut splices: Vec<Splice> = vec![Splice::replace(
            FIRST_IFD_OFFSET_RANGE,
            self.endianness.u32_bytes(first_ifd).to_vec(),
        )];

        for run in &freed {
            let mut replacement: Vec<u8> = vec![0; run.len()];
            if target.as_ref() == Some(run) {
                replacement.truncate(start - run.start);
                replacement.extend_from_slice(&layout);
                if replacement.len() < run.len() {
                    replacement.resize(run.len(), 0);
                }
            }
            splices.push(Splice::replace(run.clone(), replacement));
        }

        if target.is_none() {
            log::trace!("No freed run fits. Appending directories instead.");
            let mut appended: Vec<u8> = vec![0; start - file_len];
            appended.extend(layout);
            splices.push(Splice::insert(file_len, appended));
        }

        Ok(splices)
    }
}

/// Byte runs owned by the old directories, in file order.
///
/// Runs never overlap the header, image data, or thumbnails the new set
/// doesn't carry.
fn reclaimable(exif: &Exif, set: &OutputSet, file_len: usize) -> Vec<Range<usize>> {
    let mut owned: Vec<Range<u64>> = Vec::new();
    let mut kept: Vec<Range<u64>> = vec![0..HEADER_LEN as u64];
    let mut image: Vec<(u64, Option<u64>)> = Vec::new();

    for dir in exif.directories() {
        let table_start: u64 = dir.offset() as u64;
        owned.push(table_start..table_start + dir.table_len());
        owned.extend(
            dir.fields()
                .iter()
                .filter_map(Field::oversized_storage)
                .map(|value| value.range()),
        );

        if let Some(range) = thumbnail_range(dir) {
            let carried: bool = dir.thumbnail().is_some()
                && set.directory(dir.kind()).and_then(|d| d.thumbnail()) == dir.thumbnail();
            if carried {
                owned.push(range);
            } else {
                kept.push(range);
            }
        }

        if dir.kind().is_chained() {
            image.extend(image_data(dir));
        }
    }

    // image data without a byte count runs up to the next metadata, at most
    for (start, len) in image {
        let end: u64 = match len {
            Some(len) => start.saturating_add(len),
            None => {
                log::trace!("No byte count for image data at `{start}`. Keeping up to the next directory.");
                owned
                    .iter()
                    .map(|r| r.start)
                    .filter(|s| *s > start)
                    .min()
                    .unwrap_or(file_len as u64)
            }
        };
        kept.push(start..end);
    }

    let clip = |range: Range<u64>| -> Range<usize> {
        let end: u64 = range.end.min(file_len as u64);
        range.start.min(end) as usize..end as usize
    };

    // values start on word boundaries, so a trailing pad byte goes with its value
    let owned: Vec<Range<usize>> = owned
        .into_iter()
        .map(|r| clip(r.start..word_align_u64(r.end)))
        .collect();
    let kept: Vec<Range<usize>> = kept.into_iter().map(clip).collect();

    subtract(merge(owned), &merge(kept))
}

/// Where a chained directory says its thumbnail is.
fn thumbnail_range(dir: &Directory) -> Option<Range<u64>> {
    if !dir.kind().is_chained() {
        return None;
    }

    let start: u64 = u64::try_from(dir.find_field(JPEG_INTERCHANGE_FORMAT)?.as_i64().ok()?).ok()?;
    let len: u64 =
        u64::try_from(dir.find_field(JPEG_INTERCHANGE_FORMAT_LENGTH)?.as_i64().ok()?).ok()?;
    Some(start..start.saturating_add(len))
}

/// Strips and tiles a directory points at, as `(offset, byte count)`.
fn image_data(dir: &Directory) -> Vec<(u64, Option<u64>)> {
    let mut found: Vec<(u64, Option<u64>)> = Vec::new();

    for (offsets_tag, counts_tag) in IMAGE_DATA_TAGS {
        let Some(offsets) = dir
            .find_field(offsets_tag)
            .and_then(|f| f.as_i64_array().ok())
        else {
            continue;
        };
        let counts: Option<Vec<i64>> = dir
            .find_field(counts_tag)
            .and_then(|f| f.as_i64_array().ok())
            .filter(|counts| counts.len() == offsets.len());

        for (index, offset) in offsets.iter().enumerate() {
            let Ok(start) = u64::try_from(*offset) else {
                continue;
            };
            let len: Option<u64> = counts
                .as_ref()
                .and_then(|c| u64::try_from(c[index]).ok());
            found.push((start, len));
        }
    }

    found
}

/// Sorts ranges, joining any that touch or overlap.
fn merge(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    ranges.retain(|r| !r.is_empty());
    ranges.sort_by_key(|r| r.start);

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Cuts every `taken` byte out of `free`. Both must come from [`merge`].
fn subtract(free: Vec<Range<usize>>, taken: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut out: Vec<Range<usize>> = Vec::with_capacity(free.len());

    for mut run in free {
        for t in taken {
            if t.end <= run.start || t.start >= run.end {
                continue;
            }
            if t.start > run.start {
                out.push(run.start..t.start);
            }
            run.start = t.end.min(run.end);
        }

        if !run.is_empty() {
            out.push(run);
        }
    }

    out
}

fn word_align(n: usize) -> usize {
    n + n % 2
}

fn word_align_u64(n: u64) -> u64 {
    n + n % 2
}

#[cfg(test)]
mod tests {
    use tiff_meta_types::exif::{
        Endianness,
        ifd::DirectoryType,
        tags::{ExifTag, JPEG_INTERCHANGE_FORMAT, RootTag},
    };

    use super::{Tiff, merge, subtract};
    use crate::{
        MetadataProvider, MetadataProviderRaw,
        exif::typed::{Number, TypedValue},
        util::logger,
        write::OutputSet,
    };

    /// A TIFF whose IFD 0 is followed by some fake strip data.
    fn tiff(endianness: Endianness) -> Vec<u8> {
        let mut set = OutputSet::new(endianness);
        let root = set.get_or_create_directory(DirectoryType::Root);
        root.set_field(RootTag::Make.tag_id(), TypedValue::Text("Leaf".into()))
            .unwrap();
        root.set_field(
            RootTag::StripOffsets.tag_id(),
            TypedValue::Scalar(Number::Long(200)),
        )
        .unwrap();

        let mut file = set.serialize().unwrap();
        file.resize(200, 0);
        file.extend_from_slice(&[0xAB; 33]);
        file
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn unchanged_metadata_rewrites_to_the_same_file() {
        logger();

        for endianness in [Endianness::Little, Endianness::Big] {
            let file = tiff(endianness);
            let tiff = Tiff::new(&file).unwrap();

            let set = OutputSet::from_exif(&tiff.exif().unwrap().unwrap());
            assert_eq!(tiff.update_exif_lossless(&set).unwrap(), file);
        }
    }

    #[test]
    fn bigger_metadata_moves_to_the_end() {
        logger();

        for endianness in [Endianness::Little, Endianness::Big] {
            let file = tiff(endianness);
            let tiff = Tiff::new(&file).unwrap();
            let old_root: usize = tiff.exif().unwrap().unwrap().root().offset() as usize;

            let mut set = OutputSet::from_exif(&tiff.exif().unwrap().unwrap());
            set.get_or_create_directory(DirectoryType::Exif)
                .set_field(
                    ExifTag::LensMake.tag_id(),
                    TypedValue::Text("Schneider".into()),
                )
                .unwrap();

            let out = tiff.update_exif_lossless(&set).unwrap();

            // header and strip stay put. the old table is wiped
            assert_eq!(&out[..4], &file[..4]);
            assert_eq!(&out[200..file.len()], &file[200..]);
            assert!(out[old_root..old_root + 18].iter().all(|b| *b == 0));
            assert_eq!(out.len() % 2, 0);

            let rewritten = Tiff::new(&out).unwrap();
            let exif = rewritten.exif().unwrap().unwrap();
            assert!(exif.root().offset() as usize >= file.len());
            assert_eq!(
                exif.find_field(DirectoryType::Exif, ExifTag::LensMake.tag_id())
                    .unwrap()
                    .as_string(),
                Ok(Some("Schneider".into()))
            );
            assert_eq!(
                exif.find_field(DirectoryType::Root, RootTag::StripOffsets.tag_id())
                    .unwrap()
                    .as_i32(),
                Ok(200)
            );

            // once at the end, the directories stay there
            let twice = rewritten.update_exif_lossless(&set).unwrap();
            assert_eq!(twice, out);
        }
    }

    #[test]
    fn removed_fields_and_directories_leave_no_trace() {
        logger();

        let mut original = OutputSet::new(Endianness::Little);
        let root = original.get_or_create_directory(DirectoryType::Root);
        root.set_field(
            RootTag::Make.tag_id(),
            TypedValue::Text("SECRET-CAMERA-SERIAL".into()),
        )
        .unwrap();
        root.set_field(RootTag::Model.tag_id(), TypedValue::Text("K-1 Mark II".into()))
            .unwrap();
        root.set_field(
            RootTag::StripOffsets.tag_id(),
            TypedValue::Scalar(Number::Long(400)),
        )
        .unwrap();
        root.set_field(
            RootTag::StripByteCounts.tag_id(),
            TypedValue::Scalar(Number::Long(16)),
        )
        .unwrap();
        original.set_gps_coordinates(139.6917, 35.6895).unwrap();

        let mut file = original.serialize().unwrap();
        file.resize(400, 0);
        file.extend_from_slice(&[0x5A; 16]);

        let tiff = Tiff::new(&file).unwrap();
        let mut set = OutputSet::from_exif(&tiff.exif().unwrap().unwrap());
        set.directory_mut(DirectoryType::Root)
            .unwrap()
            .remove_field(RootTag::Make.tag_id())
            .unwrap();
        set.remove_directory(DirectoryType::Gps).unwrap();

        let out = tiff.update_exif_lossless(&set).unwrap();
        assert!(!contains(&out, b"SECRET-CAMERA-SERIAL"));
        assert_eq!(out.len(), file.len());
        assert_eq!(&out[400..], &file[400..]);

        let rewritten = Tiff::new(&out).unwrap();
        let exif = rewritten.exif().unwrap().unwrap();
        assert_eq!(exif.root().offset(), 8);
        assert!(exif.find_field(DirectoryType::Root, RootTag::Make.tag_id()).is_none());
        assert!(exif.find_directory(DirectoryType::Gps).is_none());
        assert_eq!(
            exif.find_field(DirectoryType::Root, RootTag::Model.tag_id())
                .unwrap()
                .as_string(),
            Ok(Some("K-1 Mark II".into()))
        );

        // the same edit, again and again, doesn't grow the file
        let mut again = out.clone();
        for _ in 0..4 {
            again = Tiff::new(&again).unwrap().update_exif_lossless(&set).unwrap();
        }
        assert_eq!(again, out);
    }

    #[test]
    fn thumbnails_move_only_when_carried() {
        logger();

        let thumbnail: Vec<u8> = vec![0xFF, 0xD8, 0x10, 0x20, 0x30, 0xFF, 0xD9];

        let mut original = OutputSet::new(Endianness::Big);
        original
            .get_or_create_directory(DirectoryType::Root)
            .set_field(RootTag::Make.tag_id(), TypedValue::Text("Phase One".into()))
            .unwrap();
        original
            .get_or_create_directory(DirectoryType::SubIfd(1))
            .set_thumbnail(Some(thumbnail.clone()));
        let file = original.serialize().unwrap();

        let tiff = Tiff::new(&file).unwrap();
        let exif = tiff.exif().unwrap().unwrap();
        let at: usize = exif
            .find_field(DirectoryType::SubIfd(1), JPEG_INTERCHANGE_FORMAT)
            .unwrap()
            .as_i64()
            .unwrap() as usize;

        // carried over: its old spot is reused
        let set = OutputSet::from_exif(&exif);
        assert_eq!(tiff.update_exif_lossless(&set).unwrap(), file);

        // dropped: its bytes are left alone
        let mut without = set.clone();
        without
            .directory_mut(DirectoryType::SubIfd(1))
            .unwrap()
            .set_thumbnail(None);
        let out = tiff.update_exif_lossless(&without).unwrap();
        assert_eq!(&out[at..at + thumbnail.len()], thumbnail.as_slice());

        let rewritten = Tiff::new(&out).unwrap();
        assert!(
            rewritten
                .exif()
                .unwrap()
                .unwrap()
                .find_directory(DirectoryType::SubIfd(1))
                .is_none()
        );
    }

    #[test]
    fn directories_follow_the_file_byte_order() {
        logger();

        let file = tiff(Endianness::Big);
        let tiff = Tiff::new(&file).unwrap();

        let mut set = OutputSet::new(Endianness::Little);
        set.get_or_create_directory(DirectoryType::Root)
            .set_field(
                RootTag::Orientation.tag_id(),
                TypedValue::Scalar(Number::Short(3)),
            )
            .unwrap();

        let out = tiff.update_exif_lossless(&set).unwrap();
        let rewritten = Tiff::new(&out).unwrap();
        let exif = rewritten.exif().unwrap().unwrap();

        assert_eq!(exif.endianness(), Endianness::Big);
        assert_eq!(
            exif.find_field(DirectoryType::Root, RootTag::Orientation.tag_id())
                .unwrap()
                .as_i32(),
            Ok(3)
        );
    }

    #[test]
    fn exif_is_decoded_from_the_file_and_cached() {
        logger();

        let file = tiff(Endianness::Little);
        let tiff = Tiff::new(&file).unwrap();

        // nothing is copied before the first decode
        assert!(tiff.exif_raw().read().is_none());

        let first = tiff.exif().unwrap().unwrap();
        let second = tiff.exif().unwrap().unwrap();
        assert!(std::sync::Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn free_runs_skip_kept_bytes() {
        logger();

        let free = merge(vec![20..30, 8..12, 12..16, 28..40, 50..50]);
        assert_eq!(free, vec![8..16, 20..40]);

        let kept = merge(vec![10..11, 24..26, 36..60]);
        assert_eq!(subtract(free, &kept), vec![8..10, 11..16, 20..24, 26..36]);
    }

    #[test]
    fn bad_headers_are_rejected() {
        logger();

        assert!(Tiff::new(b"II*\0").is_err());
        assert!(Tiff::new(b"II*\0\x02\0\0\0").is_err());
    }
}
