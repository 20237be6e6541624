//! Definitions for tags in each kind of directory.
//!
//! # `tags`
//!
//! Every directory kind ([`DirectoryType`]) has its own closed table of known
//! tags. The same number can mean different things in different tables (GPS
//! tag `1` is the latitude reference, Interop tag `1` is the interop index),
//! so lookups are always keyed by `(DirectoryType, u16)`.
//!
//! ## For contributors
//!
//! <div class="warning">
//! The rest of this documentation is only useful when adding tags.
//! </div>
//!
//! Each table is one `tag_table!` invocation. An entry looks like:
//!
//! ```text
//! ImageWidth = 256 => "Image width", [Short, Long], 1;
//! ```
//!
//! ...where the list names the [`FieldType`]s the standard allows, and the last
//! part is the expected count (`*` for "any amount").
//!
//! Tags with special handling (directory pointers, dates, GPS rationals) are
//! listed in [`KnownTag::sub_directory`] and [`KnownTag::decoder`].

use crate::exif::{
    ifd::DirectoryType,
    primitives::{FieldCount, FieldType},
};

/// Turns a table entry's count into a [`FieldCount`].
macro_rules! count {
    (*) => {
        FieldCount::Any
    };
    ($n:literal) => {
        FieldCount::Known($n)
    };
}

/// Creates the tag enum for one directory kind.
macro_rules! tag_table {
    ($(#[$meta:meta])* enum $enum_name:ident => $directory:expr,
        $( $key_ident:ident = $key_tag:literal => $tag_name:literal, [$($ty:ident),+], $count:tt; )+
    ) => {
        $(#[$meta])*
        #[repr(u16)]
        #[non_exhaustive]
        #[derive(Clone, Copy, Debug, Hash, PartialEq, PartialOrd, Eq, Ord)]
        pub enum $enum_name {
            $( $key_ident = $key_tag, )+
        }

        impl $enum_name {
            /// The directory kind this table belongs to.
            pub const fn directory() -> DirectoryType {
                $directory
            }

            /// Returns this tag's number.
            pub const fn tag_id(&self) -> u16 {
                *self as u16
            }

            /// The tag's name as written in the standard.
            pub const fn tag_name(&self) -> &'static str {
                match self {
                    $( Self::$key_ident => $tag_name, )+
                }
            }

            /// The field type(s) the standard allows for this tag.
            pub const fn types(&self) -> &'static [FieldType] {
                match self {
                    $( Self::$key_ident => &[$(FieldType::$ty),+], )+
                }
            }

            /// How many primitives this tag is expected to hold.
            pub const fn count(&self) -> FieldCount {
                match self {
                    $( Self::$key_ident => count!($count), )+
                }
            }
        }

        impl core::convert::TryFrom<u16> for $enum_name {
            type Error = ();

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                match value {
                    $( $key_tag => Ok($enum_name::$key_ident), )+
                    _ => Err(()),
                }
            }
        }
    };
}

/// How a tag's raw bytes become a typed value.
#[derive(Clone, Copy, Debug, Hash, PartialEq, PartialOrd, Eq, Ord)]
pub enum TagDecoder {
    /// Use the field type's own rule.
    Generic,

    /// An ASCII `YYYY:MM:DD HH:MM:SS` timestamp.
    DateTime,

    /// Always a list of rationals, even when there's only one.
    RationalList,
}

/// Everything known about one tag, in one place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TagInfo {
    pub tag: u16,
    pub name: &'static str,
    pub directory: DirectoryType,
    pub types: &'static [FieldType],
    pub count: FieldCount,
    pub decoder: TagDecoder,

    /// If set, this tag's value is the offset of a directory of this kind.
    pub sub_directory: Option<DirectoryType>,
}

impl TagInfo {
    /// Whether the value is expected to hold more (or fewer) than one
    /// primitive.
    pub const fn is_array(&self) -> bool {
        !matches!(self.count, FieldCount::Known(1))
    }

    /// The field type a writer should use when it has no other preference.
    pub const fn preferred_type(&self) -> FieldType {
        self.types[0]
    }

    /// A short description: number, hex number, and name.
    ///
    /// ```
    /// use tiff_meta_types::exif::tags::{KnownTag, RootTag};
    ///
    /// let info = KnownTag::Root(RootTag::Make).info();
    /// assert_eq!(info.description(), "271 (0x10f: Make)");
    /// ```
    pub fn description(&self) -> String {
        format!("{} (0x{:x}: {})", self.tag, self.tag, self.name)
    }
}

/// A tag known to one of the tables.
#[derive(Copy, Clone, Debug, Hash, PartialEq, PartialOrd, Eq, Ord)]
pub enum KnownTag {
    Root(RootTag),
    Exif(ExifTag),
    Gps(GpsTag),
    Interop(InteropTag),
}

impl KnownTag {
    /// Looks up a tag number inside a directory kind.
    ///
    /// Chained directories (IFD 1 and later) share IFD 0's table.
    ///
    /// ```
    /// use tiff_meta_types::exif::{
    ///     ifd::DirectoryType,
    ///     tags::{GpsTag, InteropTag, KnownTag},
    /// };
    ///
    /// assert_eq!(
    ///     KnownTag::find(DirectoryType::Gps, 1),
    ///     Some(KnownTag::Gps(GpsTag::GPSLatitudeRef))
    /// );
    /// assert_eq!(
    ///     KnownTag::find(DirectoryType::Interop, 1),
    ///     Some(KnownTag::Interop(InteropTag::InteroperabilityIndex))
    /// );
    /// assert_eq!(KnownTag::find(DirectoryType::Gps, 60_000), None);
    /// ```
    pub fn find(directory: DirectoryType, tag_id: u16) -> Option<Self> {
        Self::try_from((directory, tag_id)).ok()
    }

    /// Returns this tag's number.
    pub const fn tag_id(&self) -> u16 {
        match self {
            KnownTag::Root(k) => k.tag_id(),
            KnownTag::Exif(k) => k.tag_id(),
            KnownTag::Gps(k) => k.tag_id(),
            KnownTag::Interop(k) => k.tag_id(),
        }
    }

    /// Grabs a tag's name as defined in the standard.
    ///
    /// ```
    /// use tiff_meta_types::exif::tags::{KnownTag, RootTag};
    ///
    /// let image_width: KnownTag = KnownTag::Root(RootTag::ImageWidth);
    /// assert_eq!(image_width.tag_name(), "Image width");
    /// ```
    pub const fn tag_name(&self) -> &'static str {
        match self {
            KnownTag::Root(k) => k.tag_name(),
            KnownTag::Exif(k) => k.tag_name(),
            KnownTag::Gps(k) => k.tag_name(),
            KnownTag::Interop(k) => k.tag_name(),
        }
    }

    /// Returns the type(s) this tag's value may have.
    pub const fn types(&self) -> &'static [FieldType] {
        match self {
            KnownTag::Root(k) => k.types(),
            KnownTag::Exif(k) => k.types(),
            KnownTag::Gps(k) => k.types(),
            KnownTag::Interop(k) => k.types(),
        }
    }

    /// Returns the number of primitives this tag's value may store.
    pub const fn count(&self) -> FieldCount {
        match self {
            KnownTag::Root(k) => k.count(),
            KnownTag::Exif(k) => k.count(),
            KnownTag::Gps(k) => k.count(),
            KnownTag::Interop(k) => k.count(),
        }
    }

    /// The table this tag comes from.
    pub const fn directory(&self) -> DirectoryType {
        match self {
            KnownTag::Root(_) => RootTag::directory(),
            KnownTag::Exif(_) => ExifTag::directory(),
            KnownTag::Gps(_) => GpsTag::directory(),
            KnownTag::Interop(_) => InteropTag::directory(),
        }
    }

    /// If this tag points at another directory, which kind it points at.
    ///
    /// ```
    /// use tiff_meta_types::exif::{ifd::DirectoryType, tags::{KnownTag, RootTag}};
    ///
    /// assert_eq!(
    ///     KnownTag::Root(RootTag::GpsInfoIfdPointer).sub_directory(),
    ///     Some(DirectoryType::Gps)
    /// );
    /// assert_eq!(KnownTag::Root(RootTag::Make).sub_directory(), None);
    /// ```
    pub const fn sub_directory(&self) -> Option<DirectoryType> {
        match self {
            KnownTag::Root(RootTag::ExifIfdPointer) => Some(DirectoryType::Exif),
            KnownTag::Root(RootTag::GpsInfoIfdPointer) => Some(DirectoryType::Gps),
            KnownTag::Exif(ExifTag::InteroperabilityIfdPointer) => Some(DirectoryType::Interop),
            _ => None,
        }
    }

    /// Which decode rule applies to this tag's value.
    pub const fn decoder(&self) -> TagDecoder {
        match self {
            KnownTag::Root(RootTag::DateTime)
            | KnownTag::Exif(ExifTag::DateTimeOriginal)
            | KnownTag::Exif(ExifTag::DateTimeDigitized) => TagDecoder::DateTime,

            KnownTag::Gps(
                GpsTag::GPSLatitude
                | GpsTag::GPSLongitude
                | GpsTag::GPSTimeStamp
                | GpsTag::GPSDestLatitude
                | GpsTag::GPSDestLongitude,
            ) => TagDecoder::RationalList,

            _ => TagDecoder::Generic,
        }
    }

    /// Collects everything known about this tag.
    pub const fn info(&self) -> TagInfo {
        TagInfo {
            tag: self.tag_id(),
            name: self.tag_name(),
            directory: self.directory(),
            types: self.types(),
            count: self.count(),
            decoder: self.decoder(),
            sub_directory: self.sub_directory(),
        }
    }
}

impl TryFrom<(DirectoryType, u16)> for KnownTag {
    type Error = ();

    fn try_from(value: (DirectoryType, u16)) -> Result<Self, Self::Error> {
        let (directory, tag_id): (DirectoryType, u16) = value;

        match directory {
            DirectoryType::Root | DirectoryType::SubIfd(_) => {
                RootTag::try_from(tag_id).map(KnownTag::Root)
            }
            DirectoryType::Exif => ExifTag::try_from(tag_id).map(KnownTag::Exif),
            DirectoryType::Gps => GpsTag::try_from(tag_id).map(KnownTag::Gps),
            DirectoryType::Interop => InteropTag::try_from(tag_id).map(KnownTag::Interop),
        }
    }
}

/// Pointer tags that lead from a parent directory to a child.
///
/// Each entry is `(parent, tag, child)`, in the order children are written.
pub const SUB_DIRECTORY_POINTERS: &[(DirectoryType, u16, DirectoryType)] = &[
    (
        DirectoryType::Root,
        RootTag::ExifIfdPointer.tag_id(),
        DirectoryType::Exif,
    ),
    (
        DirectoryType::Root,
        RootTag::GpsInfoIfdPointer.tag_id(),
        DirectoryType::Gps,
    ),
    (
        DirectoryType::Exif,
        ExifTag::InteroperabilityIfdPointer.tag_id(),
        DirectoryType::Interop,
    ),
];

/// Offset of an embedded JPEG thumbnail (IFD 1, usually).
pub const JPEG_INTERCHANGE_FORMAT: u16 = RootTag::JPEGInterchangeFormat.tag_id();

/// Length in bytes of an embedded JPEG thumbnail.
pub const JPEG_INTERCHANGE_FORMAT_LENGTH: u16 = RootTag::JPEGInterchangeFormatLength.tag_id();

/*
 *
 *
 *  TIFF Rev. 6.0 attributes (IFD 0 and the chained IFDs)
 *
 *
 */
tag_table!(
    /// Tags of IFD 0 and of every chained IFD after it.
    enum RootTag => DirectoryType::Root,
    NewSubfileType = 254 => "New subfile type", [Long], 1;
    ImageWidth = 256 => "Image width", [Short, Long], 1;
    ImageLength = 257 => "Image height", [Short, Long], 1;
    BitsPerSample = 258 => "Number of bits per component", [Short], *;
    Compression = 259 => "Compression scheme", [Short], 1;
    PhotometricInterpretation = 262 => "Pixel composition", [Short], 1;
    ImageDescription = 270 => "Image title", [Ascii], *;
    Make = 271 => "Make", [Ascii], *;
    Model = 272 => "Model", [Ascii], *;
    StripOffsets = 273 => "Image data location", [Long, Short], *;
    Orientation = 274 => "Orientation of image", [Short], 1;
    SamplesPerPixel = 277 => "Number of components", [Short], 1;
    RowsPerStrip = 278 => "Number of rows per strip", [Long, Short], 1;
    StripByteCounts = 279 => "Bytes per compressed strip", [Long, Short], *;
    XResolution = 282 => "Image resolution in width direction", [Rational], 1;
    YResolution = 283 => "Image resolution in height direction", [Rational], 1;
    PlanarConfiguration = 284 => "Image data arrangement", [Short], 1;
    ResolutionUnit = 296 => "Unit of X and Y resolution", [Short], 1;
    TransferFunction = 301 => "Transfer function", [Short], 768;
    Software = 305 => "Software used", [Ascii], *;
    DateTime = 306 => "File change date and time", [Ascii], 20;
    Artist = 315 => "Person who created the image", [Ascii], *;
    HostComputer = 316 => "Host computer", [Ascii], *;
    Predictor = 317 => "Predictor", [Short], 1;
    WhitePoint = 318 => "White point chromaticity", [Rational], 2;
    PrimaryChromaticities = 319 => "Chromaticities of primaries", [Rational], 6;
    ColorMap = 320 => "Color map", [Short], *;
    TileWidth = 322 => "Tile width", [Short, Long], 1;
    TileLength = 323 => "Tile length", [Short, Long], 1;
    TileOffsets = 324 => "Tile offsets", [Long], *;
    TileByteCounts = 325 => "Tile byte counts", [Long, Short], *;
    SubIfds = 330 => "Sub IFDs", [Long], *;
    ExtraSamples = 338 => "Extra samples", [Short], *;
    SampleFormat = 339 => "Sample format", [Short], *;
    JPEGInterchangeFormat = 513 => "Offset to JPEG SOI", [Long], 1;
    JPEGInterchangeFormatLength = 514 => "Bytes of JPEG data", [Long], 1;
    YCbCrCoefficients = 529 => "Color space transformation matrix coefficients", [Rational], 3;
    YCbCrSubSampling = 530 => "Subsampling ratio of Y to C", [Short], 2;
    YCbCrPositioning = 531 => "Y and C positioning", [Short], 1;
    ReferenceBlackWhite = 532 => "Pair of black and white reference values", [Rational], 6;
    Rating = 18246 => "Rating", [Short], 1;
    Copyright = 33432 => "Copyright holder", [Ascii], *;
    ExifIfdPointer = 34665 => "Exif IFD pointer", [Long], 1;
    GpsInfoIfdPointer = 34853 => "GPS info IFD pointer", [Long], 1;
    XPTitle = 40091 => "Windows title", [Byte], *;
    XPComment = 40092 => "Windows comment", [Byte], *;
    XPAuthor = 40093 => "Windows author", [Byte], *;
    XPKeywords = 40094 => "Windows keywords", [Byte], *;
    XPSubject = 40095 => "Windows subject", [Byte], *;
);

/*
 *
 *
 *  Exif IFD attributes
 *
 *
 */
tag_table!(
    /// Tags of the Exif IFD.
    enum ExifTag => DirectoryType::Exif,
    ExposureTime = 33434 => "Exposure time", [Rational], 1;
    FNumber = 33437 => "F number", [Rational], 1;
    ExposureProgram = 34850 => "Exposure program", [Short], 1;
    SpectralSensitivity = 34852 => "Spectral sensitivity", [Ascii], *;
    PhotographicSensitivity = 34855 => "Photographic sensitivity", [Short], *;
    SensitivityType = 34864 => "Sensitivity type", [Short], 1;
    ExifVersion = 36864 => "Exif version", [Undefined], 4;
    DateTimeOriginal = 36867 => "Date and time of original data generation", [Ascii], 20;
    DateTimeDigitized = 36868 => "Date and time of digital data generation", [Ascii], 20;
    OffsetTime = 36880 => "Offset data of DateTime", [Ascii], 7;
    OffsetTimeOriginal = 36881 => "Offset data of DateTimeOriginal", [Ascii], 7;
    OffsetTimeDigitized = 36882 => "Offset data of DateTimeDigitized", [Ascii], 7;
    ComponentsConfiguration = 37121 => "Meaning of each component", [Undefined], 4;
    CompressedBitsPerPixel = 37122 => "Image compression mode", [Rational], 1;
    ShutterSpeedValue = 37377 => "Shutter speed", [SignedRational], 1;
    ApertureValue = 37378 => "Aperture", [Rational], 1;
    BrightnessValue = 37379 => "Brightness", [SignedRational], 1;
    ExposureBiasValue = 37380 => "Exposure bias", [SignedRational], 1;
    MaxApertureValue = 37381 => "Maximum lens aperture", [Rational], 1;
    SubjectDistance = 37382 => "Subject distance", [Rational], 1;
    MeteringMode = 37383 => "Metering mode", [Short], 1;
    LightSource = 37384 => "Light source", [Short], 1;
    Flash = 37385 => "Flash", [Short], 1;
    FocalLength = 37386 => "Lens focal length", [Rational], 1;
    SubjectArea = 37396 => "Subject area", [Short], *;
    MakerNote = 37500 => "Manufacturer notes", [Undefined], *;
    UserComment = 37510 => "User comments", [Undefined], *;
    SubSecTime = 37520 => "DateTime subseconds", [Ascii], *;
    SubSecTimeOriginal = 37521 => "DateTimeOriginal subseconds", [Ascii], *;
    SubSecTimeDigitized = 37522 => "DateTimeDigitized subseconds", [Ascii], *;
    Temperature = 37888 => "Temperature", [SignedRational], 1;
    Humidity = 37889 => "Humidity", [Rational], 1;
    Pressure = 37890 => "Pressure", [Rational], 1;
    WaterDepth = 37891 => "Water depth", [SignedRational], 1;
    Acceleration = 37892 => "Acceleration", [Rational], 1;
    CameraElevationAngle = 37893 => "Camera elevation angle", [SignedRational], 1;
    FlashpixVersion = 40960 => "Supported Flashpix version", [Undefined], 4;
    ColorSpace = 40961 => "Color space information", [Short], 1;
    PixelXDimension = 40962 => "Valid image width", [Short, Long], 1;
    PixelYDimension = 40963 => "Valid image height", [Short, Long], 1;
    RelatedSoundFile = 40964 => "Related audio file", [Ascii], 13;
    InteroperabilityIfdPointer = 40965 => "Interoperability IFD pointer", [Long], 1;
    FlashEnergy = 41483 => "Flash energy", [Rational], 1;
    FocalPlaneXResolution = 41486 => "Focal plane X resolution", [Rational], 1;
    FocalPlaneYResolution = 41487 => "Focal plane Y resolution", [Rational], 1;
    FocalPlaneResolutionUnit = 41488 => "Focal plane resolution unit", [Short], 1;
    SubjectLocation = 41492 => "Subject location", [Short], 2;
    ExposureIndex = 41493 => "Exposure index", [Rational], 1;
    SensingMethod = 41495 => "Sensing method", [Short], 1;
    FileSource = 41728 => "File source", [Undefined], 1;
    SceneType = 41729 => "Scene type", [Undefined], 1;
    CFAPattern = 41730 => "CFA pattern", [Undefined], *;
    CustomRendered = 41985 => "Custom image processing", [Short], 1;
    ExposureMode = 41986 => "Exposure mode", [Short], 1;
    WhiteBalance = 41987 => "White balance", [Short], 1;
    DigitalZoomRatio = 41988 => "Digital zoom ratio", [Rational], 1;
    FocalLengthIn35mmFilm = 41989 => "Focal length in 35 mm film", [Short], 1;
    SceneCaptureType = 41990 => "Scene capture type", [Short], 1;
    GainControl = 41991 => "Gain control", [Short], 1;
    Contrast = 41992 => "Contrast", [Short], 1;
    Saturation = 41993 => "Saturation", [Short], 1;
    Sharpness = 41994 => "Sharpness", [Short], 1;
    DeviceSettingDescription = 41995 => "Device settings description", [Undefined], *;
    SubjectDistanceRange = 41996 => "Subject distance range", [Short], 1;
    ImageUniqueID = 42016 => "Unique image ID", [Ascii], 33;
    CameraOwnerName = 42032 => "Camera owner name", [Ascii], *;
    BodySerialNumber = 42033 => "Body serial number", [Ascii], *;
    LensSpecification = 42034 => "Lens specification", [Rational], 4;
    LensMake = 42035 => "Lens make", [Ascii], *;
    LensModel = 42036 => "Lens model", [Ascii], *;
    LensSerialNumber = 42037 => "Lens serial number", [Ascii], *;
    Gamma = 42240 => "Gamma", [Rational], 1;
);

/*
 *
 *
 *  GPS attributes
 *
 *
 */
tag_table!(
    /// Tags of the GPS IFD.
    enum GpsTag => DirectoryType::Gps,
    GPSVersionID = 0 => "GPS tag version", [Byte], 4;
    GPSLatitudeRef = 1 => "North or South Latitude", [Ascii], 2;
    GPSLatitude = 2 => "Latitude", [Rational], 3;
    GPSLongitudeRef = 3 => "East or West Longitude", [Ascii], 2;
    GPSLongitude = 4 => "Longitude", [Rational], 3;
    GPSAltitudeRef = 5 => "Altitude reference", [Byte], 1;
    GPSAltitude = 6 => "Altitude", [Rational], 1;
    GPSTimeStamp = 7 => "GPS time (atomic clock)", [Rational], 3;
    GPSSatellites = 8 => "GPS satellites used for measurement", [Ascii], *;
    GPSStatus = 9 => "GPS receiver status", [Ascii], 2;
    GPSMeasureMode = 10 => "GPS measurement mode", [Ascii], 2;
    GPSDOP = 11 => "Measurement precision", [Rational], 1;
    GPSSpeedRef = 12 => "Speed unit", [Ascii], 2;
    GPSSpeed = 13 => "Speed of GPS receiver", [Rational], 1;
    GPSTrackRef = 14 => "Reference for direction of movement", [Ascii], 2;
    GPSTrack = 15 => "Direction of movement", [Rational], 1;
    GPSImgDirectionRef = 16 => "Reference for direction of image", [Ascii], 2;
    GPSImgDirection = 17 => "Direction of image", [Rational], 1;
    GPSMapDatum = 18 => "Geodetic survey data used", [Ascii], *;
    GPSDestLatitudeRef = 19 => "Reference for latitude of destination", [Ascii], 2;
    GPSDestLatitude = 20 => "Latitude of destination", [Rational], 3;
    GPSDestLongitudeRef = 21 => "Reference for longitude of destination", [Ascii], 2;
    GPSDestLongitude = 22 => "Longitude of destination", [Rational], 3;
    GPSDestBearingRef = 23 => "Reference for bearing of destination", [Ascii], 2;
    GPSDestBearing = 24 => "Bearing of destination", [Rational], 1;
    GPSDestDistanceRef = 25 => "Reference for distance to destination", [Ascii], 2;
    GPSDestDistance = 26 => "Distance to destination", [Rational], 1;
    GPSProcessingMethod = 27 => "Name of GPS processing method", [Undefined], *;
    GPSAreaInformation = 28 => "Name of GPS area", [Undefined], *;
    GPSDateStamp = 29 => "GPS date", [Ascii], 11;
    GPSDifferential = 30 => "GPS differential correction", [Short], 1;
    GPSHPositioningError = 31 => "Horizontal positioning error", [Rational], 1;
);

/*
 *
 *
 *  Interoperability IFD attributes
 *
 *
 */
tag_table!(
    /// Tags of the Interoperability IFD.
    enum InteropTag => DirectoryType::Interop,
    InteroperabilityIndex = 1 => "Interoperability identification", [Ascii], *;
    InteroperabilityVersion = 2 => "Interoperability version", [Undefined], 4;
    RelatedImageWidth = 4097 => "Related image width", [Short, Long], 1;
    RelatedImageLength = 4098 => "Related image length", [Short, Long], 1;
);

#[cfg(test)]
mod tests {
    use super::{ExifTag, GpsTag, KnownTag, RootTag, SUB_DIRECTORY_POINTERS, TagDecoder};
    use crate::exif::{ifd::DirectoryType, primitives::FieldCount};

    #[test]
    fn chained_directories_use_the_root_table() {
        assert_eq!(
            KnownTag::find(DirectoryType::SubIfd(1), 513),
            Some(KnownTag::Root(RootTag::JPEGInterchangeFormat))
        );
    }

    #[test]
    fn same_number_differs_by_directory() {
        let gps = KnownTag::find(DirectoryType::Gps, 2).unwrap();
        let root = KnownTag::find(DirectoryType::Root, 2);

        assert_eq!(gps, KnownTag::Gps(GpsTag::GPSLatitude));
        assert_eq!(root, None);
    }

    #[test]
    fn pointer_table_agrees_with_tag_info() {
        for (parent, tag, child) in SUB_DIRECTORY_POINTERS {
            let known = KnownTag::find(*parent, *tag).unwrap();
            assert_eq!(known.sub_directory(), Some(*child));
            assert_eq!(child.parent(), Some(*parent));
        }
    }

    #[test]
    fn special_decoders() {
        assert_eq!(
            KnownTag::Exif(ExifTag::DateTimeOriginal).decoder(),
            TagDecoder::DateTime
        );
        assert_eq!(
            KnownTag::Gps(GpsTag::GPSLongitude).decoder(),
            TagDecoder::RationalList
        );
        assert_eq!(
            KnownTag::Gps(GpsTag::GPSAltitude).decoder(),
            TagDecoder::Generic
        );
    }

    #[test]
    fn array_ness_follows_count() {
        let lat = KnownTag::Gps(GpsTag::GPSLatitude).info();
        assert_eq!(lat.count, FieldCount::Known(3));
        assert!(lat.is_array());

        let width = KnownTag::Root(RootTag::ImageWidth).info();
        assert!(!width.is_array());
    }
}
