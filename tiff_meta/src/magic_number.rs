//! Helps handle files without knowing their file type beforehand.
//!
//! This module is helpful for those who need general file handling, such as
//! on a web server.
//!
//! It allows you to avoid specifying a provider, instead relying on magic
//! numbers (easy identifiers for a file format) to figure it out at runtime.
//!
//! # Usage
//!
//! ```
//! use tiff_meta::magic_number::{AnyProvider, MagicNumber};
//!
//! // a little-endian TIFF with an empty IFD 0
//! let file: &[u8] = &[b'I', b'I', 42, 0, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0];
//!
//! // the `get` function finds the `MagicNumber`. it does NOT parse the whole
//! // file!
//! let magic_num: Option<MagicNumber> = tiff_meta::get(file);
//! assert_eq!(magic_num, Some(MagicNumber::Tiff));
//!
//! // on the other hand, `parse` finds the file type, then parses it for you
//! // to use:
//! let parsed: AnyProvider = tiff_meta::parse(file).unwrap();
//! assert!(matches!(parsed, AnyProvider::Tiff(Ok(..))));
//! assert_eq!(parsed.magic_number(), MagicNumber::Tiff);
//! ```

use std::sync::Arc;

use crate::{
    MetadataProvider,
    exif::{Exif, error::ExifFatalError},
    providers::{RewriteError, jpeg::Jpeg, png::Png, tiff::Tiff},
    write::OutputSet,
};

/// Reminds contributors to add each provider to the `generate!()` call!
///
/// Do not implement this trait manually -- the `generate` macro will do it for
/// you! :D
#[doc(hidden)]
#[diagnostic::on_unimplemented(
    message = "Please add this type to the `generate!()` macro in the `tiff_meta/src/magic_number.rs` file."
)]
pub trait _MagicNumberMarker {
    #[doc(hidden)]
    fn _do_not_implement_this_manually(self);
}

/// This macro generates two enums and some implementations.
///
/// Both enums are used to handle files in a generic way.
///
/// # Enums + Implementations
///
/// - `MagicNumber`: a representation of which format is present.
/// - `AnyProvider`: one of the providers, or the error it hit.
macro_rules! generate {
    ( $(
        // name of the provider (must be the same as the provider_ty)
        $variant:ident => {
            // the actual type we map to
            provider_ty: $provider_ty:ident
        },
    )+) => {
        /// A magic number.
        ///
        /// Each one represents one of the supported kinds of
        /// [`MetadataProvider`].
        #[repr(u16)]
        #[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Eq, Hash)]
        pub enum MagicNumber {
            $($variant,)+
        }

        /// A wrapper for "any" provider.
        ///
        /// When the magic number matched but the file's structure didn't,
        /// this holds the provider's construction error.
        #[derive(Clone, Debug)]
        pub enum AnyProvider<'file> {
            $($variant(
                Result<
                    $provider_ty<'file>,
                    <$provider_ty<'file> as MetadataProvider<'file>>::ConstructionError
                >),
            )+
        }

        impl MagicNumber {
            /// Attempts to find the magic number of a given file.
            #[inline(always)]
            pub fn new(input: &[u8]) -> Option<Self> {
                get(input)
            }
        }

        impl<'file> AnyProvider<'file> {
            /// Uses the magic number of a file to parse it.
            ///
            /// If the file isn't supported, this returns `None`.
            #[inline(always)]
            pub fn new(input: &'file [u8]) -> Option<Self> {
                parse(input)
            }

            /// Returns the [`MagicNumber`] of this provider.
            pub fn magic_number(&self) -> MagicNumber {
                match self {
                    $(Self::$variant(..) => MagicNumber::$variant,)+
                }
            }

            /// Gets Exif metadata from the inner [`MetadataProvider`].
            ///
            /// For more information, see [`MetadataProvider::exif`].
            pub fn exif(&self) -> Option<Result<Arc<Exif>, ExifFatalError>> {
                match self {
                    $(
                        Self::$variant(maybe_inner) => {
                            let Ok(inner) = maybe_inner else {
                                log::error!("The inner provider is an error, not `Ok`. Cannot get metadata.");
                                return None;
                            };
                            <$provider_ty as MetadataProvider>::exif(inner)
                        },
                    )+
                }
            }

            /// Rewrites the file with new Exif metadata.
            ///
            /// For more information, see
            /// [`MetadataProvider::update_exif_lossless`].
            pub fn update_exif_lossless(&self, set: &OutputSet) -> Result<Vec<u8>, RewriteError> {
                match self {
                    $(
                        Self::$variant(maybe_inner) => {
                            let inner = maybe_inner.as_ref().map_err(|e| {
                                log::error!("Can't rewrite a malformed file. err: {e}");
                                RewriteError::MalformedContainer {
                                    format: Some(MagicNumber::$variant),
                                }
                            })?;
                            <$provider_ty as MetadataProvider>::update_exif_lossless(inner, set)
                        },
                    )+
                }
            }
        }

        // implement `From<SomeProvider>` for both
        $(
            impl<'file> From<$provider_ty<'file>> for MagicNumber {
                fn from(_item: $provider_ty<'file>) -> Self {
                    Self::$variant
                }
            }

            impl<'file> From<$provider_ty<'file>> for AnyProvider<'file> {
                fn from(item: $provider_ty<'file>) -> Self {
                    Self::$variant(Ok(item))
                }
            }

            impl _MagicNumberMarker for $provider_ty<'_> {
                fn _do_not_implement_this_manually(self) {}
            }
        )+

        impl From<AnyProvider<'_>> for MagicNumber {
            fn from(item: AnyProvider<'_>) -> MagicNumber {
                item.magic_number()
            }
        }

        // create the `parse` function (for `tiff_meta::parse`)
        pub(crate) fn parse(input: &[u8]) -> Option<AnyProvider<'_>> {
            // magic numbers don't overlap, so the first match is the only one
            $(
                log::trace!("Attempting to parse blob as `{}`...", stringify!($variant));
                if <$provider_ty as MetadataProvider>::magic_number(input) {
                    return Some(AnyProvider::$variant(
                        <$provider_ty as MetadataProvider>::new(input),
                    ));
                }
                log::trace!("Not `{}`!", stringify!($variant));
            )+

            // if none of the providers match, return `None`
            log::trace!("No providers matched the blob.");
            None
        }

        // now, create `get`
        pub(crate) fn get(input: &[u8]) -> Option<MagicNumber> {
            $(
                if <$provider_ty as MetadataProvider>::magic_number(input) {
                    return Some(MagicNumber::$variant);
                }
            )+

            log::trace!("No providers matched the blob.");
            None
        }
    };
}

generate!(
    Tiff => { provider_ty: Tiff },
    Jpeg => { provider_ty: Jpeg },
    Png => { provider_ty: Png },
);
