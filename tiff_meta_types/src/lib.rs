//! # `tiff_meta_types`
//!
//! Static knowledge used by `tiff_meta`: the primitive TIFF field types, the
//! directory kinds, and the per-directory tag tables.
//!
//! Nothing in here touches bytes. It's all read-only data that lives for the
//! whole program.

#![forbid(unsafe_code)]

pub mod exif;
