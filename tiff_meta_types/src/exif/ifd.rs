//! Contains stuff related to IFDs.
//!
//! For more info, see the [`DirectoryType`] enumeration.

/// Which kind of image file directory (IFD) we're looking at.
///
/// A directory's kind isn't written in the file. It's implied by how we got
/// there: the header points at IFD 0, IFD 0 may chain to IFD 1 and beyond,
/// and special "pointer tags" lead to the Exif, GPS, and Interop
/// directories.
///
/// The derived ordering is also the order directories are written in.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub enum DirectoryType {
    /// "IFD 0", the first directory the TIFF header points at.
    #[doc(alias = "IFD0")]
    #[doc(alias = "TIFF")]
    Root,

    /// The "Exif" IFD provides camera-based metadata.
    #[doc(alias = "ExifIFD")]
    Exif,

    /// The GPS IFD contains location metadata.
    #[doc(alias = "GPSIFD")]
    Gps,

    /// The interoperability IFD, reached from the Exif IFD.
    #[doc(alias = "InteropIFD")]
    Interop,

    /// The `n`-th directory after IFD 0 on the next-IFD chain (`n >= 1`).
    ///
    /// In Exif, `SubIfd(1)` is "IFD 1", which describes the thumbnail.
    SubIfd(u16),
}

impl DirectoryType {
    /// The directory that must exist for this one to be reachable, if any.
    ///
    /// ```
    /// use tiff_meta_types::exif::ifd::DirectoryType;
    ///
    /// assert_eq!(DirectoryType::Interop.parent(), Some(DirectoryType::Exif));
    /// assert_eq!(DirectoryType::Gps.parent(), Some(DirectoryType::Root));
    /// assert_eq!(DirectoryType::Root.parent(), None);
    /// ```
    pub const fn parent(&self) -> Option<DirectoryType> {
        match self {
            Self::Root => None,
            Self::Exif | Self::Gps | Self::SubIfd(_) => Some(Self::Root),
            Self::Interop => Some(Self::Exif),
        }
    }

    /// Whether this directory sits on the next-IFD chain (IFD 0, IFD 1, ...).
    pub const fn is_chained(&self) -> bool {
        matches!(self, Self::Root | Self::SubIfd(_))
    }

    /// Human-readable name, as found in the standards.
    pub fn name(&self) -> String {
        match self {
            Self::Root => "IFD0".into(),
            Self::Exif => "Exif".into(),
            Self::Gps => "GPS".into(),
            Self::Interop => "Interop".into(),
            Self::SubIfd(n) => format!("IFD{n}"),
        }
    }
}
