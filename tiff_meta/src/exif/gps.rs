//! Reads coordinates out of the GPS directory.

use tiff_meta_types::exif::{primitives::FieldType, tags::GpsTag};

use super::{
    error::FieldValueError,
    field::Field,
    ifd::Directory,
    typed::{Number, TypedValue},
};

/// Latitude and longitude from a GPS directory.
///
/// Only made when all four of the reference and coordinate fields are present.
#[derive(Clone, Debug, PartialEq)]
pub struct GpsInfo<'exif> {
    directory: &'exif Directory,
    latitude_ref: String,
    longitude_ref: String,
    latitude: [Number; 3],
    longitude: [Number; 3],
}

impl<'exif> GpsInfo<'exif> {
    /// Reads the four coordinate fields from a GPS directory.
    ///
    /// Gives `Ok(None)` when the directory or any of the four fields is
    /// missing. Fields that are present but hold the wrong kind of value are
    /// an error.
    pub fn from_directory(
        directory: Option<&'exif Directory>,
    ) -> Result<Option<Self>, FieldValueError> {
        let Some(directory) = directory else {
            log::trace!("No GPS directory.");
            return Ok(None);
        };

        let find = |tag: GpsTag| {
            let found = directory.find_field(tag.tag_id());
            if found.is_none() {
                log::trace!("GPS directory has no `{tag:?}` field.");
            }
            found
        };

        let Some(latitude_ref) = find(GpsTag::GPSLatitudeRef) else {
            return Ok(None);
        };
        let Some(latitude) = find(GpsTag::GPSLatitude) else {
            return Ok(None);
        };
        let Some(longitude_ref) = find(GpsTag::GPSLongitudeRef) else {
            return Ok(None);
        };
        let Some(longitude) = find(GpsTag::GPSLongitude) else {
            return Ok(None);
        };

        Ok(Some(Self {
            directory,
            latitude_ref: reference(latitude_ref)?,
            longitude_ref: reference(longitude_ref)?,
            latitude: triplet(latitude)?,
            longitude: triplet(longitude)?,
        }))
    }

    /// The GPS directory this came from.
    pub fn directory(&self) -> &'exif Directory {
        self.directory
    }

    /// Usually `N` or `S`.
    pub fn latitude_ref(&self) -> &str {
        &self.latitude_ref
    }

    /// Usually `E` or `W`.
    pub fn longitude_ref(&self) -> &str {
        &self.longitude_ref
    }

    /// Degrees, minutes, and seconds.
    pub fn latitude(&self) -> &[Number; 3] {
        &self.latitude
    }

    /// Degrees, minutes, and seconds.
    pub fn longitude(&self) -> &[Number; 3] {
        &self.longitude
    }

    /// Signed decimal latitude. South is negative.
    pub fn latitude_as_degrees_north(&self) -> f64 {
        signed_degrees(&self.latitude, self.latitude_ref == "S")
    }

    /// Signed decimal longitude. West is negative.
    pub fn longitude_as_degrees_east(&self) -> f64 {
        signed_degrees(&self.longitude, self.longitude_ref == "W")
    }
}

impl core::fmt::Display for GpsInfo<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let [lat_d, lat_m, lat_s] = &self.latitude;
        let [lon_d, lon_m, lon_s] = &self.longitude;

        write!(
            f,
            "[GPS. Latitude: {lat_d} degrees, {lat_m} minutes, {lat_s} seconds {}, \
            Longitude: {lon_d} degrees, {lon_m} minutes, {lon_s} seconds {}]",
            self.latitude_ref, self.longitude_ref
        )
    }
}

fn signed_degrees([degrees, minutes, seconds]: &[Number; 3], negative: bool) -> f64 {
    let value: f64 = degrees.to_f64() + minutes.to_f64() / 60.0 + seconds.to_f64() / 3600.0;

    if negative { -value } else { value }
}

fn reference(field: &Field) -> Result<String, FieldValueError> {
    match field.value()? {
        TypedValue::Text(s) => Ok(s),
        other => {
            log::error!("GPS reference field wasn't text. got: {}", other.kind_name());
            Err(FieldValueError::TypeMismatch {
                expected: "text",
                found: other.kind_name(),
            })
        }
    }
}

fn triplet(field: &Field) -> Result<[Number; 3], FieldValueError> {
    let value: TypedValue = field.value()?;
    let mismatch = |found: &'static str| {
        log::error!("GPS coordinate wasn't three rationals. got: {found}");
        FieldValueError::TypeMismatch {
            expected: "three rationals",
            found,
        }
    };

    let TypedValue::NumberArray(numbers) = &value else {
        return Err(mismatch(value.kind_name()));
    };

    if !numbers.iter().all(|n| {
        matches!(
            n.field_type(),
            FieldType::Rational | FieldType::SignedRational
        )
    }) {
        return Err(mismatch("a list of non-rational numbers"));
    }

    match numbers.as_slice() {
        [d, m, s] => Ok([*d, *m, *s]),
        _ => Err(mismatch("a list of the wrong length")),
    }
}

#[cfg(test)]
mod tests {
    use tiff_meta_types::exif::{
        Endianness,
        ifd::DirectoryType,
        primitives::{FieldType, Rational},
        tags::GpsTag,
    };

    use super::GpsInfo;
    use crate::{
        exif::{
            error::FieldValueError,
            field::Field,
            ifd::Directory,
            typed::{Number, TypedValue, encode},
        },
        util::logger,
    };

    fn gps_field(tag: GpsTag, ty: FieldType, value: TypedValue) -> Field {
        let (raw, count) = encode(ty, &value, Endianness::Big).unwrap();
        Field::new(
            tag.tag_id(),
            DirectoryType::Gps,
            ty,
            count,
            0,
            raw,
            Endianness::Big,
            0,
        )
    }

    fn rationals(values: [u32; 3]) -> TypedValue {
        TypedValue::NumberArray(
            values
                .iter()
                .map(|v| Number::Rational(Rational::new(*v, 1)))
                .collect(),
        )
    }

    fn directory(fields: Vec<Field>) -> Directory {
        Directory {
            kind: DirectoryType::Gps,
            offset: 0,
            entry_count: fields.len() as u16,
            fields,
            children: Vec::new(),
            next: None,
            thumbnail: None,
            errors: Vec::new(),
        }
    }

    fn new_york() -> Vec<Field> {
        vec![
            gps_field(
                GpsTag::GPSLatitudeRef,
                FieldType::Ascii,
                TypedValue::Text("N".into()),
            ),
            gps_field(GpsTag::GPSLatitude, FieldType::Rational, rationals([40, 43, 0])),
            gps_field(
                GpsTag::GPSLongitudeRef,
                FieldType::Ascii,
                TypedValue::Text("W".into()),
            ),
            gps_field(GpsTag::GPSLongitude, FieldType::Rational, rationals([74, 0, 0])),
        ]
    }

    #[test]
    fn decimal_degrees() {
        logger();

        let dir = directory(new_york());
        let info = GpsInfo::from_directory(Some(&dir)).unwrap().unwrap();

        assert!((info.latitude_as_degrees_north() - 40.7167).abs() < 0.0001);
        assert_eq!(info.longitude_as_degrees_east(), -74.0);
        assert_eq!(info.latitude_ref(), "N");
        assert_eq!(
            info.to_string(),
            "[GPS. Latitude: 40 degrees, 43 minutes, 0 seconds N, \
            Longitude: 74 degrees, 0 minutes, 0 seconds W]"
        );
    }

    #[test]
    fn any_missing_field_means_no_info() {
        logger();

        assert_eq!(GpsInfo::from_directory(None), Ok(None));

        for skip in 0..4 {
            let fields: Vec<Field> = new_york()
                .into_iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, f)| f)
                .collect();
            let dir = directory(fields);

            assert_eq!(GpsInfo::from_directory(Some(&dir)), Ok(None), "skipped #{skip}");
        }
    }

    #[test]
    fn reference_is_case_sensitive() {
        logger();

        let mut fields = new_york();
        fields[2] = gps_field(
            GpsTag::GPSLongitudeRef,
            FieldType::Ascii,
            TypedValue::Text("w".into()),
        );
        let dir = directory(fields);
        let info = GpsInfo::from_directory(Some(&dir)).unwrap().unwrap();

        assert_eq!(info.longitude_as_degrees_east(), 74.0);
    }

    #[test]
    fn malformed_coordinates_are_errors() {
        logger();

        let mut fields = new_york();
        fields[1] = gps_field(
            GpsTag::GPSLatitude,
            FieldType::Rational,
            TypedValue::NumberArray(vec![Number::Rational(Rational::new(40, 1))]),
        );
        let dir = directory(fields);

        assert!(matches!(
            GpsInfo::from_directory(Some(&dir)),
            Err(FieldValueError::TypeMismatch { .. })
        ));
    }
}
