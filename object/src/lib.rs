#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    unused_qualifications,
    unused_import_braces
)]
//! High-level reading of whole-slide DICOM files.
//!
//! This crate binds the streaming data set walker to actual files: it
//! checks the 128-byte preamble and `DICM` magic code, consumes the file
//! meta information group, and then drives a handler over the main data
//! set. On top of that sit the two canned drivers of the whole-slide
//! workflow:
//!
//! - [`read_index`] extracts the referenced file identifiers of a
//!   `DICOMDIR` index, yielding the paths of the component instances of a
//!   multi-file study;
//! - [`read_level`] extracts the pyramid level description of a VL Whole
//!   Slide Microscopy Image Storage instance: pixel matrix and tile
//!   geometry, frame count, study fingerprint, the overview flag, and the
//!   per-tile fragment table of the encapsulated pixel data.
//!
//! Custom traversals can be run with [`DicomReader`] directly.

pub mod dicomdir;
pub mod file;
pub mod level;
pub mod meta;

pub use dicomdir::read_index;
pub use file::DicomReader;
pub use level::{read_level, Level, TileEntry};
pub use meta::FileMetaTable;
pub use wsdicom_core::{ErrorKind, Tag, VR};
pub use wsdicom_parser::{DataSetHandler, TagPath, TagPathSet};
