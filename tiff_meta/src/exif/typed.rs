//! Typed values: what a field's raw bytes mean once its type is applied.
//!
//! Every [`FieldType`] has one decode rule (raw bytes to [`TypedValue`]) and
//! one encode rule (the other way around). They live together here so the two
//! directions can't drift apart.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use tiff_meta_types::exif::{
    Endianness,
    primitives::{FieldType, Rational, SignedRational},
    tags::TagDecoder,
};
use winnow::{
    Parser,
    binary::{Endianness as WinnowEndianness, f32, f64, i8, i16, i32, u8, u16, u32},
    combinator::repeat,
    error::EmptyError,
};

use super::error::FieldValueError;

/// Arrays longer than this are cut short by [`TypedValue::describe`].
pub const DESCRIPTION_MAX_ELEMENTS: usize = 50;

/// The `strftime`-style layout of Exif timestamps.
const EXIF_DATE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// One element of a field's value.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum Number {
    Byte(u8),
    SignedByte(i8),
    Short(u16),
    SignedShort(i16),
    Long(u32),
    SignedLong(i32),
    Rational(Rational),
    SignedRational(SignedRational),
    Float(f32),
    Double(f64),
}

impl Number {
    /// The field type this element is stored as.
    pub const fn field_type(&self) -> FieldType {
        match self {
            Number::Byte(_) => FieldType::Byte,
            Number::SignedByte(_) => FieldType::SignedByte,
            Number::Short(_) => FieldType::Short,
            Number::SignedShort(_) => FieldType::SignedShort,
            Number::Long(_) => FieldType::Long,
            Number::SignedLong(_) => FieldType::SignedLong,
            Number::Rational(_) => FieldType::Rational,
            Number::SignedRational(_) => FieldType::SignedRational,
            Number::Float(_) => FieldType::Float,
            Number::Double(_) => FieldType::Double,
        }
    }

    /// Narrows to an `i32`.
    ///
    /// Unsigned types are zero-extended, signed ones sign-extended. A `Long`
    /// keeps its bits, so values past `i32::MAX` come out negative. Rationals
    /// use truncating division, and a zero denominator gives `0`.
    pub fn to_i32(&self) -> i32 {
        match *self {
            Number::Byte(v) => v as i32,
            Number::SignedByte(v) => v as i32,
            Number::Short(v) => v as i32,
            Number::SignedShort(v) => v as i32,
            Number::Long(v) => v as i32,
            Number::SignedLong(v) => v,
            Number::Rational(r) => r.numerator.checked_div(r.denominator).unwrap_or(0) as i32,
            Number::SignedRational(r) => r.numerator.checked_div(r.denominator).unwrap_or(0),
            Number::Float(v) => v as i32,
            Number::Double(v) => v as i32,
        }
    }

    /// Widens to an `i64`. Nothing is lost except the fractional part of
    /// floats and rationals.
    pub fn to_i64(&self) -> i64 {
        match *self {
            Number::Byte(v) => v as i64,
            Number::SignedByte(v) => v as i64,
            Number::Short(v) => v as i64,
            Number::SignedShort(v) => v as i64,
            Number::Long(v) => v as i64,
            Number::SignedLong(v) => v as i64,
            Number::Rational(r) => {
                (r.numerator as i64)
                    .checked_div(r.denominator as i64)
                    .unwrap_or(0)
            }
            Number::SignedRational(r) => (r.numerator as i64)
                .checked_div(r.denominator as i64)
                .unwrap_or(0),
            Number::Float(v) => v as i64,
            Number::Double(v) => v as i64,
        }
    }

    /// Widens to an `f64`. Rationals are divided out.
    pub fn to_f64(&self) -> f64 {
        match *self {
            Number::Byte(v) => v as f64,
            Number::SignedByte(v) => v as f64,
            Number::Short(v) => v as f64,
            Number::SignedShort(v) => v as f64,
            Number::Long(v) => v as f64,
            Number::SignedLong(v) => v as f64,
            Number::Rational(r) => r.to_f64(),
            Number::SignedRational(r) => r.to_f64(),
            Number::Float(v) => v as f64,
            Number::Double(v) => v,
        }
    }

    fn write_bytes(&self, endianness: Endianness, out: &mut Vec<u8>) {
        match *self {
            Number::Byte(v) => out.push(v),
            Number::SignedByte(v) => out.push(v as u8),
            Number::Short(v) => out.extend_from_slice(&endianness.u16_bytes(v)),
            Number::SignedShort(v) => out.extend_from_slice(&endianness.u16_bytes(v as u16)),
            Number::Long(v) => out.extend_from_slice(&endianness.u32_bytes(v)),
            Number::SignedLong(v) => out.extend_from_slice(&endianness.u32_bytes(v as u32)),
            Number::Rational(r) => {
                out.extend_from_slice(&endianness.u32_bytes(r.numerator));
                out.extend_from_slice(&endianness.u32_bytes(r.denominator));
            }
            Number::SignedRational(r) => {
                out.extend_from_slice(&endianness.u32_bytes(r.numerator as u32));
                out.extend_from_slice(&endianness.u32_bytes(r.denominator as u32));
            }
            Number::Float(v) => out.extend_from_slice(&endianness.u32_bytes(v.to_bits())),
            Number::Double(v) => out.extend_from_slice(&endianness.u64_bytes(v.to_bits())),
        }
    }
}

impl core::fmt::Display for Number {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Number::Byte(v) => write!(f, "{v}"),
            Number::SignedByte(v) => write!(f, "{v}"),
            Number::Short(v) => write!(f, "{v}"),
            Number::SignedShort(v) => write!(f, "{v}"),
            Number::Long(v) => write!(f, "{v}"),
            Number::SignedLong(v) => write!(f, "{v}"),
            Number::Rational(r) => fmt_fraction(
                f,
                r.numerator as i64,
                r.denominator as i64,
                r.to_f64(),
            ),
            Number::SignedRational(r) => fmt_fraction(
                f,
                r.numerator as i64,
                r.denominator as i64,
                r.to_f64(),
            ),
            Number::Float(v) => write!(f, "{v}"),
            Number::Double(v) => write!(f, "{v}"),
        }
    }
}

/// `n` when the fraction is whole, `n/d (x.xxx)` otherwise.
fn fmt_fraction(
    f: &mut core::fmt::Formatter<'_>,
    numerator: i64,
    denominator: i64,
    approx: f64,
) -> core::fmt::Result {
    if denominator == 0 {
        return write!(f, "Invalid rational ({numerator}/{denominator})");
    }

    if numerator % denominator == 0 {
        write!(f, "{}", numerator / denominator)
    } else {
        write!(f, "{numerator}/{denominator} ({approx:.3})")
    }
}

/// A decoded field value.
///
/// The variant follows from the field's type and count; see [`decode`].
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    /// No value at all. Encodes to zero elements.
    Missing,

    /// Exactly one element.
    Scalar(Number),

    /// `Rational`, `SRational`, `SByte` and `SShort` lists.
    NumberArray(Vec<Number>),

    /// ASCII text, trailing NULs removed.
    Text(String),

    /// `Byte` or `Undefined` lists.
    ByteArray(Vec<u8>),
    ShortArray(Vec<u16>),

    /// `SLong` lists.
    IntArray(Vec<i32>),

    /// `Long` lists.
    LongArray(Vec<u32>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),

    /// A timestamp read from a date-time tag.
    DateTime(DateTime<FixedOffset>),
}

impl TypedValue {
    /// A short, human-readable name for this variant. Used in errors.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            TypedValue::Missing => "missing",
            TypedValue::Scalar(_) => "a single number",
            TypedValue::NumberArray(_) => "a list of numbers",
            TypedValue::Text(_) => "text",
            TypedValue::ByteArray(_) => "a list of bytes",
            TypedValue::ShortArray(_) => "a list of shorts",
            TypedValue::IntArray(_) => "a list of signed longs",
            TypedValue::LongArray(_) => "a list of longs",
            TypedValue::FloatArray(_) => "a list of floats",
            TypedValue::DoubleArray(_) => "a list of doubles",
            TypedValue::DateTime(_) => "a date and time",
        }
    }

    /// The field type this value encodes to when no other type is asked for.
    pub fn natural_type(&self) -> FieldType {
        match self {
            TypedValue::Missing => FieldType::Undefined,
            TypedValue::Scalar(n) => n.field_type(),
            TypedValue::NumberArray(v) => v
                .first()
                .map(Number::field_type)
                .unwrap_or(FieldType::Rational),
            TypedValue::Text(_) | TypedValue::DateTime(_) => FieldType::Ascii,
            TypedValue::ByteArray(_) => FieldType::Undefined,
            TypedValue::ShortArray(_) => FieldType::Short,
            TypedValue::IntArray(_) => FieldType::SignedLong,
            TypedValue::LongArray(_) => FieldType::Long,
            TypedValue::FloatArray(_) => FieldType::Float,
            TypedValue::DoubleArray(_) => FieldType::Double,
        }
    }

    /// Number of elements this value holds.
    pub fn len(&self) -> usize {
        match self {
            TypedValue::Missing => 0,
            TypedValue::Scalar(_) | TypedValue::DateTime(_) => 1,
            TypedValue::NumberArray(v) => v.len(),
            TypedValue::Text(s) => s.len(),
            TypedValue::ByteArray(v) => v.len(),
            TypedValue::ShortArray(v) => v.len(),
            TypedValue::IntArray(v) => v.len(),
            TypedValue::LongArray(v) => v.len(),
            TypedValue::FloatArray(v) => v.len(),
            TypedValue::DoubleArray(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn scalar(&self, expected: &'static str) -> Result<Number, FieldValueError> {
        match self {
            TypedValue::Scalar(n) => Ok(*n),
            TypedValue::Missing => Err(FieldValueError::MissingValue),
            other => Err(FieldValueError::TypeMismatch {
                expected,
                found: other.kind_name(),
            }),
        }
    }

    /// The value as one `i32`. Must be a single number.
    pub fn as_i32(&self) -> Result<i32, FieldValueError> {
        self.scalar("a single integer").map(|n| n.to_i32())
    }

    /// The value as one `i64`. Must be a single number.
    pub fn as_i64(&self) -> Result<i64, FieldValueError> {
        self.scalar("a single integer").map(|n| n.to_i64())
    }

    /// The value as one `f64`. Must be a single number.
    pub fn as_f64(&self) -> Result<f64, FieldValueError> {
        self.scalar("a single number").map(|n| n.to_f64())
    }

    /// Every element as a [`Number`]. A single number becomes a list of one.
    pub fn numbers(&self) -> Result<Vec<Number>, FieldValueError> {
        Ok(match self {
            TypedValue::Scalar(n) => vec![*n],
            TypedValue::NumberArray(v) => v.clone(),
            TypedValue::ByteArray(v) => v.iter().copied().map(Number::Byte).collect(),
            TypedValue::ShortArray(v) => v.iter().copied().map(Number::Short).collect(),
            TypedValue::IntArray(v) => v.iter().copied().map(Number::SignedLong).collect(),
            TypedValue::LongArray(v) => v.iter().copied().map(Number::Long).collect(),
            TypedValue::FloatArray(v) => v.iter().copied().map(Number::Float).collect(),
            TypedValue::DoubleArray(v) => v.iter().copied().map(Number::Double).collect(),
            other @ (TypedValue::Missing | TypedValue::Text(_) | TypedValue::DateTime(_)) => {
                return Err(FieldValueError::TypeMismatch {
                    expected: "numbers",
                    found: other.kind_name(),
                });
            }
        })
    }

    /// Every element narrowed to `i32`. See [`Number::to_i32`].
    pub fn as_i32_array(&self) -> Result<Vec<i32>, FieldValueError> {
        Ok(self.numbers()?.iter().map(Number::to_i32).collect())
    }

    /// Every element widened to `i64`. See [`Number::to_i64`].
    pub fn as_i64_array(&self) -> Result<Vec<i64>, FieldValueError> {
        Ok(self.numbers()?.iter().map(Number::to_i64).collect())
    }

    /// Every element widened to `f64`. See [`Number::to_f64`].
    pub fn as_f64_array(&self) -> Result<Vec<f64>, FieldValueError> {
        Ok(self.numbers()?.iter().map(Number::to_f64).collect())
    }

    /// A single number as-is, or the (wrapping) sum of a list.
    ///
    /// Handy for tags like `StripByteCounts`, which may be split into many
    /// parts.
    pub fn as_i32_or_sum(&self) -> Result<i32, FieldValueError> {
        match self {
            TypedValue::Scalar(n) => Ok(n.to_i32()),
            other => Ok(other
                .as_i32_array()?
                .into_iter()
                .fold(0_i32, i32::wrapping_add)),
        }
    }

    /// The value as text. `Missing` gives `None`.
    pub fn as_string(&self) -> Result<Option<String>, FieldValueError> {
        match self {
            TypedValue::Text(s) => Ok(Some(s.clone())),
            TypedValue::Missing => Ok(None),
            other => Err(FieldValueError::TypeMismatch {
                expected: "text",
                found: other.kind_name(),
            }),
        }
    }

    /// Renders the value for people. Never fails.
    ///
    /// Lists are comma-separated. Once an index past
    /// [`DESCRIPTION_MAX_ELEMENTS`] is reached, the rest is replaced with
    /// `... (total)`.
    pub fn describe(&self) -> String {
        match self {
            TypedValue::Missing => String::new(),
            TypedValue::Scalar(n) => n.to_string(),
            TypedValue::Text(s) => format!("'{}'", s.trim()),
            TypedValue::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string(),
            TypedValue::NumberArray(v) => describe_list(v),
            TypedValue::ByteArray(v) => describe_list(v),
            TypedValue::ShortArray(v) => describe_list(v),
            TypedValue::IntArray(v) => describe_list(v),
            TypedValue::LongArray(v) => describe_list(v),
            TypedValue::FloatArray(v) => describe_list(v),
            TypedValue::DoubleArray(v) => describe_list(v),
        }
    }
}

fn describe_list<T: core::fmt::Display>(list: &[T]) -> String {
    let mut out = String::new();

    for (i, item) in list.iter().enumerate() {
        if i > DESCRIPTION_MAX_ELEMENTS {
            out.push_str(&format!("... ({})", list.len()));
            break;
        }
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&item.to_string());
    }

    out
}

pub(crate) fn winnow_endianness(endianness: Endianness) -> WinnowEndianness {
    match endianness {
        Endianness::Little => WinnowEndianness::Little,
        Endianness::Big => WinnowEndianness::Big,
    }
}

/// Parses `count` elements from the input.
fn list<'i, O>(
    input: &mut &'i [u8],
    count: u32,
    ty: FieldType,
    parser: impl Parser<&'i [u8], O, EmptyError>,
) -> Result<Vec<O>, FieldValueError> {
    let available: usize = input.len();

    repeat(count as usize, parser)
        .parse_next(input)
        .map_err(|_: EmptyError| {
            log::error!("Ran out of data for `{count}` elements of `{ty:?}`.");
            FieldValueError::Truncated {
                ty,
                count,
                available,
            }
        })
}

/// A list of one becomes a scalar; anything else stays a list.
fn scalar_or<T: Copy>(
    list: Vec<T>,
    scalar: impl FnOnce(T) -> Number,
    array: impl FnOnce(Vec<T>) -> TypedValue,
) -> TypedValue {
    match list.as_slice() {
        [only] => TypedValue::Scalar(scalar(*only)),
        _ => array(list),
    }
}

/// Decodes raw field bytes with the field type's own rule.
///
/// `raw` may be longer than needed; only the first `count * width` bytes are
/// read.
pub fn decode(
    ty: FieldType,
    raw: &[u8],
    endianness: Endianness,
    count: u32,
) -> Result<TypedValue, FieldValueError> {
    let needed: u64 = count as u64 * ty.size_bytes() as u64;
    if (raw.len() as u64) < needed {
        log::error!(
            "Field of type `{ty:?}` needs `{needed}` bytes, but has `{}`.",
            raw.len()
        );
        return Err(FieldValueError::Truncated {
            ty,
            count,
            available: raw.len(),
        });
    }
    let raw: &[u8] = &raw[..needed as usize];
    let e: WinnowEndianness = winnow_endianness(endianness);
    let input: &mut &[u8] = &mut &*raw;

    Ok(match ty {
        FieldType::Ascii => TypedValue::Text(ascii_text(raw)),

        FieldType::Byte | FieldType::Undefined => match raw {
            [only] => TypedValue::Scalar(Number::Byte(*only)),
            _ => TypedValue::ByteArray(raw.to_vec()),
        },

        FieldType::Short => scalar_or(
            list(input, count, ty, u16(e))?,
            Number::Short,
            TypedValue::ShortArray,
        ),

        FieldType::Long => scalar_or(
            list(input, count, ty, u32(e))?,
            Number::Long,
            TypedValue::LongArray,
        ),

        FieldType::SignedLong => scalar_or(
            list(input, count, ty, i32(e))?,
            Number::SignedLong,
            TypedValue::IntArray,
        ),

        FieldType::Float => scalar_or(
            list(input, count, ty, f32(e))?,
            Number::Float,
            TypedValue::FloatArray,
        ),

        FieldType::Double => scalar_or(
            list(input, count, ty, f64(e))?,
            Number::Double,
            TypedValue::DoubleArray,
        ),

        FieldType::SignedByte => scalar_or(
            list(input, count, ty, i8.map(Number::SignedByte))?,
            |n| n,
            TypedValue::NumberArray,
        ),

        FieldType::SignedShort => scalar_or(
            list(input, count, ty, i16(e).map(Number::SignedShort))?,
            |n| n,
            TypedValue::NumberArray,
        ),

        FieldType::Rational => scalar_or(
            list(
                input,
                count,
                ty,
                (u32(e), u32(e)).map(|(n, d)| Number::Rational(Rational::new(n, d))),
            )?,
            |n| n,
            TypedValue::NumberArray,
        ),

        FieldType::SignedRational => scalar_or(
            list(
                input,
                count,
                ty,
                (i32(e), i32(e))
                    .map(|(n, d)| Number::SignedRational(SignedRational::new(n, d))),
            )?,
            |n| n,
            TypedValue::NumberArray,
        ),
    })
}

/// Decodes raw field bytes with a tag-specific rule.
pub fn decode_with(
    decoder: TagDecoder,
    ty: FieldType,
    raw: &[u8],
    endianness: Endianness,
    count: u32,
) -> Result<TypedValue, FieldValueError> {
    match decoder {
        TagDecoder::Generic => decode(ty, raw, endianness, count),

        TagDecoder::DateTime => {
            if ty != FieldType::Ascii {
                return Err(FieldValueError::UnsupportedType {
                    ty,
                    wanted: "a date and time",
                });
            }

            let TypedValue::Text(text) = decode(ty, raw, endianness, count)? else {
                return Err(FieldValueError::UnsupportedType {
                    ty,
                    wanted: "a date and time",
                });
            };

            match NaiveDateTime::parse_from_str(text.trim(), EXIF_DATE_TIME_FORMAT) {
                Ok(naive) => Ok(TypedValue::DateTime(naive.and_utc().fixed_offset())),
                Err(e) => {
                    log::trace!("Date-time text `{text}` didn't parse, keeping it as text. err: {e}");
                    Ok(TypedValue::Text(text))
                }
            }
        }

        TagDecoder::RationalList => {
            if !matches!(ty, FieldType::Rational | FieldType::SignedRational) {
                return Err(FieldValueError::UnsupportedType {
                    ty,
                    wanted: "a list of rationals",
                });
            }

            Ok(match decode(ty, raw, endianness, count)? {
                TypedValue::Scalar(n) => TypedValue::NumberArray(vec![n]),
                other => other,
            })
        }
    }
}

/// Lossy UTF-8 with trailing NULs removed.
fn ascii_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches('\0')
        .to_string()
}

/// Encodes a value as the given field type.
///
/// Returns the raw bytes and the element count. The value's variant has to
/// match the type the way [`decode`] would have produced it; text and
/// timestamps go to `Ascii` with a trailing NUL.
pub fn encode(
    ty: FieldType,
    value: &TypedValue,
    endianness: Endianness,
) -> Result<(Vec<u8>, u32), FieldValueError> {
    let mismatch = || FieldValueError::TypeMismatch {
        expected: ty.name(),
        found: value.kind_name(),
    };

    let mut out: Vec<u8> = Vec::new();
    let count: usize = match (ty, value) {
        (_, TypedValue::Missing) => 0,

        (FieldType::Ascii, TypedValue::Text(s)) => {
            out.extend_from_slice(s.as_bytes());
            out.push(0);
            out.len()
        }
        (FieldType::Ascii, TypedValue::DateTime(dt)) => {
            out.extend_from_slice(dt.format(EXIF_DATE_TIME_FORMAT).to_string().as_bytes());
            out.push(0);
            out.len()
        }

        (FieldType::Byte | FieldType::Undefined, TypedValue::Scalar(Number::Byte(b))) => {
            out.push(*b);
            1
        }
        (FieldType::Byte | FieldType::Undefined, TypedValue::ByteArray(v)) => {
            out.extend_from_slice(v);
            v.len()
        }

        (FieldType::Short, TypedValue::ShortArray(v)) => {
            v.iter()
                .for_each(|x| out.extend_from_slice(&endianness.u16_bytes(*x)));
            v.len()
        }
        (FieldType::Long, TypedValue::LongArray(v)) => {
            v.iter()
                .for_each(|x| out.extend_from_slice(&endianness.u32_bytes(*x)));
            v.len()
        }
        (FieldType::SignedLong, TypedValue::IntArray(v)) => {
            v.iter()
                .for_each(|x| out.extend_from_slice(&endianness.u32_bytes(*x as u32)));
            v.len()
        }
        (FieldType::Float, TypedValue::FloatArray(v)) => {
            v.iter()
                .for_each(|x| out.extend_from_slice(&endianness.u32_bytes(x.to_bits())));
            v.len()
        }
        (FieldType::Double, TypedValue::DoubleArray(v)) => {
            v.iter()
                .for_each(|x| out.extend_from_slice(&endianness.u64_bytes(x.to_bits())));
            v.len()
        }

        (ty, TypedValue::Scalar(n)) if n.field_type() == ty => {
            n.write_bytes(endianness, &mut out);
            1
        }

        (
            FieldType::Rational
            | FieldType::SignedRational
            | FieldType::SignedByte
            | FieldType::SignedShort,
            TypedValue::NumberArray(v),
        ) => {
            for n in v {
                if n.field_type() != ty {
                    log::error!("List element `{n:?}` doesn't match field type `{ty:?}`.");
                    return Err(mismatch());
                }
                n.write_bytes(endianness, &mut out);
            }
            v.len()
        }

        _ => {
            log::error!(
                "Can't encode {} as field type `{ty:?}`.",
                value.kind_name()
            );
            return Err(mismatch());
        }
    };

    let count: u32 = u32::try_from(count).map_err(|_| FieldValueError::TypeMismatch {
        expected: "at most u32::MAX elements",
        found: value.kind_name(),
    })?;

    Ok((out, count))
}
