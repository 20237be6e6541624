/// An enumeration of the primitive types a directory entry may hold.
///
/// The discriminant is the type code written in bytes 2-3 of each entry.
#[repr(u16)]
#[derive(Clone, Copy, Debug, Hash, PartialEq, PartialOrd, Eq, Ord)]
pub enum FieldType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    SignedByte = 6,
    Undefined = 7,
    SignedShort = 8,
    SignedLong = 9,
    SignedRational = 10,
    Float = 11,
    Double = 12,
}

impl FieldType {
    /// Every field type, in type-code order.
    pub const ALL: [FieldType; 12] = [
        FieldType::Byte,
        FieldType::Ascii,
        FieldType::Short,
        FieldType::Long,
        FieldType::Rational,
        FieldType::SignedByte,
        FieldType::Undefined,
        FieldType::SignedShort,
        FieldType::SignedLong,
        FieldType::SignedRational,
        FieldType::Float,
        FieldType::Double,
    ];

    /// Grabs the field type's element size in bytes.
    ///
    /// ```
    /// use tiff_meta_types::exif::primitives::FieldType;
    ///
    /// assert_eq!(FieldType::SignedLong.size_bytes(), 4_u8);
    /// assert_eq!(FieldType::Rational.size_bytes(), 8_u8);
    /// ```
    pub const fn size_bytes(&self) -> u8 {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SignedByte | FieldType::Undefined => {
                1_u8
            }
            FieldType::Short | FieldType::SignedShort => 2_u8,
            FieldType::Long | FieldType::SignedLong | FieldType::Float => 4_u8,
            FieldType::Rational | FieldType::SignedRational | FieldType::Double => 8_u8,
        }
    }

    /// The type code stored in a directory entry.
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// The name used by the TIFF 6.0 standard.
    pub const fn name(&self) -> &'static str {
        match self {
            FieldType::Byte => "Byte",
            FieldType::Ascii => "ASCII",
            FieldType::Short => "Short",
            FieldType::Long => "Long",
            FieldType::Rational => "Rational",
            FieldType::SignedByte => "SByte",
            FieldType::Undefined => "Undefined",
            FieldType::SignedShort => "SShort",
            FieldType::SignedLong => "SLong",
            FieldType::SignedRational => "SRational",
            FieldType::Float => "Float",
            FieldType::Double => "Double",
        }
    }
}

impl TryFrom<u16> for FieldType {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Byte),
            2 => Ok(Self::Ascii),
            3 => Ok(Self::Short),
            4 => Ok(Self::Long),
            5 => Ok(Self::Rational),
            6 => Ok(Self::SignedByte),
            7 => Ok(Self::Undefined),
            8 => Ok(Self::SignedShort),
            9 => Ok(Self::SignedLong),
            10 => Ok(Self::SignedRational),
            11 => Ok(Self::Float),
            12 => Ok(Self::Double),

            _ => Err(()),
        }
    }
}

/// An unsigned fraction, stored as two `Long`s.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, PartialOrd, Eq, Ord)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// The fraction as a float. A zero denominator yields infinity or NaN.
    pub fn to_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

/// A signed fraction, stored as two `SLong`s.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, PartialOrd, Eq, Ord)]
pub struct SignedRational {
    pub numerator: i32,
    pub denominator: i32,
}

impl SignedRational {
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// The fraction as a float. A zero denominator yields infinity or NaN.
    pub fn to_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

/// How many primitives a known tag is expected to hold.
#[derive(Clone, Copy, Debug, Hash, PartialEq, PartialOrd, Eq, Ord)]
pub enum FieldCount {
    /// Exactly this many.
    Known(u32),

    /// Any amount. Usually strings or opaque blobs.
    Any,
}

#[cfg(test)]
mod tests {
    use super::FieldType;

    #[test]
    fn every_type_has_a_nonzero_width_and_round_trips_its_code() {
        for ty in FieldType::ALL {
            assert!(ty.size_bytes() > 0, "{ty:?} has no width");
            assert_eq!(FieldType::try_from(ty.code()), Ok(ty));
        }
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(FieldType::try_from(0_u16), Err(()));
        assert_eq!(FieldType::try_from(13_u16), Err(()));
        assert_eq!(FieldType::try_from(129_u16), Err(()));
    }
}
