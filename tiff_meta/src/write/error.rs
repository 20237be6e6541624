use crate::exif::error::FieldValueError;

/// Something stopped an [`OutputSet`](super::OutputSet) from being written.
#[derive(Clone, Debug, PartialEq, PartialOrd, Eq, Hash)]
pub enum WriteError {
    /// Some offset in the output wouldn't fit in 32 bits.
    TooLarge { size: u64 },

    /// A field's value couldn't be encoded.
    Value(FieldValueError),
}

impl core::fmt::Display for WriteError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooLarge { size } => write!(
                f,
                "Output would need offsets up to `{size}`, but TIFF offsets are limited to 32 bits."
            ),
            Self::Value(e) => write!(f, "Failed to encode a field. err: {e}"),
        }
    }
}

impl From<FieldValueError> for WriteError {
    fn from(value: FieldValueError) -> Self {
        Self::Value(value)
    }
}

impl core::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Value(e) => Some(e),
            Self::TooLarge { .. } => None,
        }
    }
}
