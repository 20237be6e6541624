//! Builds and serializes Exif blobs.
//!
//! Decoded [`Exif`] is read-only. To change something, copy it into an
//! [`OutputSet`] with [`OutputSet::from_exif`], edit that, then serialize it
//! (or hand it to a provider for a lossless rewrite).

use std::collections::BTreeMap;

use tiff_meta_types::exif::{
    Endianness,
    ifd::DirectoryType,
    primitives::{FieldType, Rational},
    tags::GpsTag,
};

use crate::exif::{
    Exif,
    error::FieldValueError,
    typed::{Number, TypedValue},
};

pub use self::{
    directory::{OutputDirectory, OutputField},
    error::WriteError,
    layout::TIFF_HEADER_LEN,
};

pub mod directory;
pub mod error;
mod layout;

/// Denominator used for the seconds part of written GPS coordinates.
pub const GPS_SECONDS_DENOMINATOR: u32 = 1_000_000;

/// Every directory to be written, keyed by kind.
///
/// Parents are implied by kind: the Exif and GPS directories hang off IFD 0,
/// Interop hangs off Exif, and `SubIfd(n)` directories are chained after
/// IFD 0 in order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputSet {
    endianness: Endianness,
    directories: BTreeMap<DirectoryType, OutputDirectory>,
}

impl OutputSet {
    /// An empty set that'll be written in the given byte order.
    pub fn new(endianness: Endianness) -> Self {
        Self {
            endianness,
            directories: BTreeMap::new(),
        }
    }

    /// Copies every directory of some decoded Exif.
    ///
    /// Directory pointers and thumbnail offsets are left out, since they're
    /// written fresh during layout. Thumbnail bytes are kept.
    pub fn from_exif(exif: &Exif) -> Self {
        let mut set = Self::new(exif.endianness());

        for dir in exif.directories() {
            if set.directories.contains_key(&dir.kind()) {
                log::warn!(
                    "Found a second {} directory (at `{}`). Only the first is kept.",
                    dir.kind().name(),
                    dir.offset()
                );
                continue;
            }

            let mut out = OutputDirectory::new(dir.kind(), exif.endianness());
            for field in dir.fields() {
                if layout::is_synthesized(dir.kind(), field.tag()) {
                    continue;
                }

                // same byte order, so this can't fail
                if let Err(e) = out.add_field(OutputField::from_field(field)) {
                    log::warn!("Couldn't copy field `{}`. err: {e}", field.tag());
                }
            }
            out.set_thumbnail(dir.thumbnail().map(<[u8]>::to_vec));

            set.directories.insert(dir.kind(), out);
        }

        set
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn directory(&self, kind: DirectoryType) -> Option<&OutputDirectory> {
        self.directories.get(&kind)
    }

    pub fn directory_mut(&mut self, kind: DirectoryType) -> Option<&mut OutputDirectory> {
        self.directories.get_mut(&kind)
    }

    /// All directories, in the order they're written.
    pub fn directories(&self) -> impl Iterator<Item = &OutputDirectory> {
        self.directories.values()
    }

    /// Gets a directory, creating it and any missing parents.
    pub fn get_or_create_directory(&mut self, kind: DirectoryType) -> &mut OutputDirectory {
        let mut parent: Option<DirectoryType> = kind.parent();
        while let Some(p) = parent {
            let endianness = self.endianness;
            self.directories.entry(p).or_insert_with(|| {
                log::trace!("Creating parent {} directory.", p.name());
                OutputDirectory::new(p, endianness)
            });
            parent = p.parent();
        }

        let endianness = self.endianness;
        self.directories
            .entry(kind)
            .or_insert_with(|| OutputDirectory::new(kind, endianness))
    }

    /// Removes a directory, along with every directory only reachable
    /// through it.
    pub fn remove_directory(&mut self, kind: DirectoryType) -> Option<OutputDirectory> {
        self.directories.retain(|k, _| *k == kind || !descends_from(*k, kind));
        self.directories.remove(&kind)
    }

    /// Finds the first field with this tag, searching directories in the
    /// order they're written.
    pub fn find_field(&self, tag: u16) -> Option<&OutputField> {
        self.directories().find_map(|d| d.find_field(tag))
    }

    /// Writes a location into the GPS directory.
    ///
    /// Both are signed decimal degrees: west and south are negative.
    pub fn set_gps_coordinates(
        &mut self,
        longitude: f64,
        latitude: f64,
    ) -> Result<(), FieldValueError> {
        if !longitude.is_finite() || !latitude.is_finite() {
            log::error!("GPS coordinates must be finite. got: `{longitude}`, `{latitude}`");
            return Err(FieldValueError::TypeMismatch {
                expected: "finite coordinates",
                found: "a non-finite number",
            });
        }

        let longitude_ref: &str = if longitude < 0.0 { "W" } else { "E" };
        let latitude_ref: &str = if latitude < 0.0 { "S" } else { "N" };

        // tag order, so a decoded copy compares equal
        let gps = self.get_or_create_directory(DirectoryType::Gps);
        gps.set_field_with_type(
            GpsTag::GPSLatitudeRef.tag_id(),
            FieldType::Ascii,
            &TypedValue::Text(latitude_ref.into()),
        )?;
        gps.set_field_with_type(
            GpsTag::GPSLatitude.tag_id(),
            FieldType::Rational,
            &degrees_minutes_seconds(latitude.abs()),
        )?;
        gps.set_field_with_type(
            GpsTag::GPSLongitudeRef.tag_id(),
            FieldType::Ascii,
            &TypedValue::Text(longitude_ref.into()),
        )?;
        gps.set_field_with_type(
            GpsTag::GPSLongitude.tag_id(),
            FieldType::Rational,
            &degrees_minutes_seconds(longitude.abs()),
        )
    }

    /// The same set, to be written in another byte order.
    pub fn with_endianness(&self, endianness: Endianness) -> Result<Self, FieldValueError> {
        Ok(Self {
            endianness,
            directories: self
                .directories
                .iter()
                .map(|(k, d)| d.reordered(endianness).map(|d| (*k, d)))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Writes a complete TIFF blob, header included.
    pub fn serialize(&self) -> Result<Vec<u8>, WriteError> {
        let mut blob: Vec<u8> = Vec::new();
        blob.extend_from_slice(&self.endianness.marker());
        blob.extend_from_slice(&self.endianness.u16_bytes(42));
        blob.extend_from_slice(&self.endianness.u32_bytes(TIFF_HEADER_LEN));

        blob.extend(self.lay_out_at(TIFF_HEADER_LEN as u64)?);
        Ok(blob)
    }

    /// Lays out the directories to sit at `start` inside an existing blob.
    ///
    /// IFD 0's table is the first thing in the returned bytes.
    pub(crate) fn lay_out_at(&self, start: u64) -> Result<Vec<u8>, WriteError> {
        layout::lay_out(self, start)
    }
}

fn descends_from(kind: DirectoryType, ancestor: DirectoryType) -> bool {
    let mut parent: Option<DirectoryType> = kind.parent();
    while let Some(p) = parent {
        if p == ancestor {
            return true;
        }
        parent = p.parent();
    }
    false
}

fn degrees_minutes_seconds(value: f64) -> TypedValue {
    let degrees: f64 = value.trunc();
    let minutes_full: f64 = value.fract() * 60.0;
    let minutes: f64 = minutes_full.trunc();
    let seconds: f64 = minutes_full.fract() * 60.0;

    // `as` saturates, which is fine for anything on Earth
    TypedValue::NumberArray(vec![
        Number::Rational(Rational::new(degrees as u32, 1)),
        Number::Rational(Rational::new(minutes as u32, 1)),
        Number::Rational(Rational::new(
            (seconds * GPS_SECONDS_DENOMINATOR as f64).round() as u32,
            GPS_SECONDS_DENOMINATOR,
        )),
    ])
}

#[cfg(test)]
mod tests {
    use tiff_meta_types::exif::{
        Endianness,
        ifd::DirectoryType,
        primitives::{FieldType, Rational},
        tags::{ExifTag, GpsTag, InteropTag, RootTag},
    };

    use super::OutputSet;
    use crate::{
        exif::{
            Exif,
            typed::{Number, TypedValue},
        },
        util::logger,
    };

    fn parse(blob: &[u8]) -> Exif {
        Exif::new(&mut &blob[..]).unwrap()
    }

    fn camera_set(endianness: Endianness) -> OutputSet {
        let mut set = OutputSet::new(endianness);

        let root = set.get_or_create_directory(DirectoryType::Root);
        root.set_field(RootTag::Make.tag_id(), TypedValue::Text("Pentax".into()))
            .unwrap();
        root.set_field(
            RootTag::Orientation.tag_id(),
            TypedValue::Scalar(Number::Short(6)),
        )
        .unwrap();

        let exif = set.get_or_create_directory(DirectoryType::Exif);
        exif.set_field(
            ExifTag::ExposureTime.tag_id(),
            TypedValue::Scalar(Number::Rational(Rational::new(1, 250))),
        )
        .unwrap();

        set.get_or_create_directory(DirectoryType::Interop)
            .set_field(
                InteropTag::InteroperabilityIndex.tag_id(),
                TypedValue::Text("R98".into()),
            )
            .unwrap();

        let ifd1 = set.get_or_create_directory(DirectoryType::SubIfd(1));
        ifd1.set_field(
            RootTag::Compression.tag_id(),
            TypedValue::Scalar(Number::Short(6)),
        )
        .unwrap();
        ifd1.set_thumbnail(Some(vec![0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9]));

        set
    }

    #[test]
    fn serialized_sets_decode_to_the_same_tree() {
        logger();

        for endianness in [Endianness::Little, Endianness::Big] {
            let set = camera_set(endianness);
            let exif = parse(&set.serialize().unwrap());

            assert_eq!(exif.endianness(), endianness);
            assert_eq!(
                exif.find_field(DirectoryType::Root, RootTag::Make.tag_id())
                    .unwrap()
                    .as_string(),
                Ok(Some("Pentax".into()))
            );
            assert_eq!(
                exif.find_field(DirectoryType::Interop, InteropTag::InteroperabilityIndex.tag_id())
                    .unwrap()
                    .as_string(),
                Ok(Some("R98".into()))
            );

            let ifd1 = exif.find_directory(DirectoryType::SubIfd(1)).unwrap();
            assert_eq!(
                ifd1.thumbnail(),
                Some([0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9].as_slice())
            );
            let next = exif.root().next().unwrap();
            assert_eq!(exif.get(next).unwrap().kind(), DirectoryType::SubIfd(1));

            // and copying it back out gives the same set
            assert_eq!(OutputSet::from_exif(&exif), set);
        }
    }

    #[test]
    fn stale_pointers_are_replaced() {
        logger();

        let mut set = OutputSet::new(Endianness::Little);
        set.get_or_create_directory(DirectoryType::Root)
            .set_field(
                RootTag::ExifIfdPointer.tag_id(),
                TypedValue::Scalar(Number::Long(9999)),
            )
            .unwrap();
        set.get_or_create_directory(DirectoryType::Exif)
            .set_field(
                ExifTag::ExposureTime.tag_id(),
                TypedValue::Scalar(Number::Rational(Rational::new(1, 60))),
            )
            .unwrap();

        let exif = parse(&set.serialize().unwrap());
        assert!(exif.find_directory(DirectoryType::Exif).is_some());

        let pointer = exif
            .find_field(DirectoryType::Root, RootTag::ExifIfdPointer.tag_id())
            .unwrap();
        assert_ne!(pointer.as_i64(), Ok(9999));
    }

    #[test]
    fn empty_directories_are_left_out() {
        logger();

        let mut set = OutputSet::new(Endianness::Big);
        set.get_or_create_directory(DirectoryType::Gps);
        set.get_or_create_directory(DirectoryType::Exif);

        let exif = parse(&set.serialize().unwrap());
        assert_eq!(exif.directories().len(), 1);
        assert!(exif.root().fields().is_empty());
    }

    #[test]
    fn parents_are_created_and_removed_together() {
        logger();

        let mut set = OutputSet::new(Endianness::Little);
        set.get_or_create_directory(DirectoryType::Interop);
        assert!(set.directory(DirectoryType::Exif).is_some());
        assert!(set.directory(DirectoryType::Root).is_some());

        assert!(set.remove_directory(DirectoryType::Exif).is_some());
        assert!(set.directory(DirectoryType::Interop).is_none());
        assert!(set.directory(DirectoryType::Root).is_some());
    }

    #[test]
    fn gps_coordinates() {
        logger();

        let mut set = OutputSet::new(Endianness::Big);
        set.set_gps_coordinates(-74.0, 40.7167).unwrap();

        assert_eq!(
            set.find_field(GpsTag::GPSLongitudeRef.tag_id())
                .unwrap()
                .value(),
            Ok(TypedValue::Text("W".into()))
        );
        let latitude = set.find_field(GpsTag::GPSLatitude.tag_id()).unwrap();
        assert_eq!(latitude.field_type(), FieldType::Rational);
        assert_eq!(latitude.count(), 3);

        let exif = parse(&set.serialize().unwrap());
        let gps = exif.gps_info().unwrap().unwrap();
        assert_eq!(gps.longitude_as_degrees_east(), -74.0);
        assert!((gps.latitude_as_degrees_north() - 40.7167).abs() < 1e-9);
        assert_eq!(gps.latitude_ref(), "N");

        assert!(set.set_gps_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn byte_order_can_be_switched() {
        logger();

        let little = camera_set(Endianness::Little);
        let big = little.with_endianness(Endianness::Big).unwrap();
        assert_eq!(big, camera_set(Endianness::Big));

        let exif = parse(&big.serialize().unwrap());
        assert_eq!(exif.endianness(), Endianness::Big);
        assert_eq!(
            exif.find_field(DirectoryType::Root, RootTag::Orientation.tag_id())
                .unwrap()
                .as_i32(),
            Ok(6)
        );
    }
}
