//! # `tiff_meta`
//!
//! A library to read TIFF-structured metadata (Exif, GPS, and friends) and to
//! write it back without disturbing the rest of the file.
//!
//! ## Reading
//!
//! Pick a provider for your file format, or let [`parse`] find one using the
//! file's magic number. Then, ask it for [`MetadataProvider::exif`].
//!
//! ## Writing
//!
//! Copy the decoded metadata into a [`write::OutputSet`], change what you
//! like, and hand it to [`MetadataProvider::update_exif_lossless`] (or
//! [`providers::rewrite_exif_lossless`]). Only the metadata segment is
//! replaced. Every other byte of the file is kept as-is.
//!
//! ## Supported containers
//!
//! - TIFF
//! - JPEG (`APP1` Exif segment)
//! - PNG (`eXIf` chunk)

#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    exif::{Exif, error::ExifFatalError},
    providers::{RewriteError, Splice, apply_splices},
    write::OutputSet,
};

pub mod exif;
pub mod magic_number;
pub mod providers;
pub mod write;

pub use magic_number::{AnyProvider, MagicNumber};

/// Finds which supported format a file is in, without parsing it.
pub fn get(input: &[u8]) -> Option<MagicNumber> {
    magic_number::get(input)
}

/// Finds a file's format, then constructs the matching provider.
pub fn parse(input: &[u8]) -> Option<AnyProvider<'_>> {
    magic_number::parse(input)
}

/// A media file with support for TIFF-structured metadata.
///
/// Each file format is a "provider" - it'll yield its metadata through
/// parsing, and knows where to put new metadata when rewriting.
pub trait MetadataProvider<'file>:
    Clone + core::fmt::Debug + Sized + Send + Sync + MetadataProviderRaw
{
    /// An error that can occur when calling [`MetadataProvider::new`].
    type ConstructionError: Clone
        + core::fmt::Debug
        + PartialEq
        + PartialOrd
        + core::error::Error
        + Sized
        + Send
        + Sync;

    /// Whether the input starts like a file of this format.
    fn magic_number(input: &[u8]) -> bool;

    /// Walks a media file's structure to find its metadata.
    ///
    /// The metadata itself isn't decoded until it's asked for.
    fn new(input: &'file [u8]) -> Result<Self, <Self as MetadataProvider<'file>>::ConstructionError>;

    /// The file this provider was made from.
    fn file(&self) -> &'file [u8];

    /// Parses `self` to find any Exif metadata.
    ///
    /// This returns `None` if the file has no Exif metadata.
    ///
    /// The result is cached, so later calls are cheap.
    ///
    /// # Errors
    ///
    /// This will return an error if the file's metadata is malformed or
    /// corrupted.
    fn exif(&self) -> Option<Result<Arc<Exif>, ExifFatalError>> {
        // to avoid data races, we check the state each time we take the lock.
        //
        // (doing so also allows us to only `read` at first, then
        // conditionally `write`... which is nice)
        fn handle_already_parsed(p: &Wrapped<Exif>) -> Option<Result<Arc<Exif>, ExifFatalError>> {
            log::trace!("Cached Exif found! Returning...");
            Some(Ok(Arc::clone(&p.0)))
        }
        fn handle_none<A>() -> Option<A> {
            log::trace!("No Exif is present in this struct. Returning early.");
            None
        }

        match &*self.exif_raw().read() {
            // we'll handle this case in a sec.
            Some(MaybeParsed::Raw(_)) => (),
            Some(MaybeParsed::Parsed(p)) => return handle_already_parsed(p),
            None => return handle_none(),
        }

        let raw = self.exif_raw();
        let locked = &mut *raw.write();
        match locked {
            Some(MaybeParsed::Raw(r)) => match Exif::new(&mut r.as_slice()) {
                Ok(p) => {
                    let wrapped: Wrapped<Exif> = Wrapped(Arc::new(p));
                    log::trace!("Completed Exif parsing! Cached internally.");
                    *locked = Some(MaybeParsed::Parsed(wrapped.clone()));
                    Some(Ok(wrapped.0))
                }
                Err(e) => {
                    log::error!("Failed to parse Exif! err: {e}");
                    *locked = None;
                    Some(Err(e))
                }
            },
            Some(MaybeParsed::Parsed(p)) => handle_already_parsed(p),
            None => handle_none(),
        }
    }

    /// Describes how to put the given metadata into this file.
    ///
    /// Each [`Splice`] replaces one byte range of the original file. The
    /// ranges don't overlap.
    fn exif_splices(&self, set: &OutputSet) -> Result<Vec<Splice>, RewriteError>;

    /// Makes a copy of the file with its Exif replaced by `set`.
    ///
    /// Everything outside the metadata segment stays byte-for-byte the same.
    fn update_exif_lossless(&self, set: &OutputSet) -> Result<Vec<u8>, RewriteError> {
        let splices: Vec<Splice> = self.exif_splices(set)?;
        apply_splices(self.file(), &splices)
    }
}

/// Raw helpers for [`MetadataProvider`] implementors.
///
/// You may or may not find these methods useful, as they deal with the
/// provider's internal buffers.
///
/// However, if you'd like the metadata exactly as it was stored, you can use
/// these methods instead!
pub trait MetadataProviderRaw {
    /// Returns the raw `Option<MaybeParsedExif>` stored inside the provider.
    ///
    /// Used primarily to implement the [`MetadataProvider::exif`] method
    /// easily.
    fn exif_raw(&self) -> Arc<RwLock<Option<MaybeParsedExif>>> {
        Arc::new(const { RwLock::new(None) })
    }
}

/// Metadata that might have been parsed already.
///
/// This type allows for caching metadata such that media files are not
/// reprocessed each additional time their parse methods are called.
///
/// ## Generics
///
/// - `R`: Raw
/// - `P`: Parsed
#[derive(Clone, Debug, PartialEq, PartialOrd, Hash)]
pub enum MaybeParsed<R, P>
where
    R: Clone + core::fmt::Debug + PartialEq + PartialOrd + core::hash::Hash,
    P: Clone + core::fmt::Debug + PartialEq + core::hash::Hash,
{
    /// Raw metadata that hasn't been processed.
    Raw(R),

    /// Metadata that's been parsed into its contents.
    Parsed(Wrapped<P>),
}

pub type MaybeParsedExif = MaybeParsed<Vec<u8>, Exif>;

/// A shared, parsed metadata value.
///
/// Two `Wrapped` values are equal only when they share an allocation.
#[derive(Clone, Debug)]
pub struct Wrapped<P: PartialEq + core::hash::Hash>(
    /// The wrapped value.
    pub Arc<P>,
);

// implement those traits below for ez derives on providers
impl<P: PartialEq + core::hash::Hash> PartialEq for Wrapped<P> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl<P: PartialEq + core::hash::Hash> PartialOrd for Wrapped<P> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        (Arc::as_ptr(&self.0)).partial_cmp(&(Arc::as_ptr(&other.0)))
    }
}
impl<P: PartialEq + core::hash::Hash> core::hash::Hash for Wrapped<P> {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

/// Internal utility methods.
pub(crate) mod util {
    /// Helper function to initialize the logger for testing.
    #[cfg(test)]
    pub fn logger() {
        _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::max())
            .format_file(true)
            .format_line_number(true)
            .try_init();
    }
}
