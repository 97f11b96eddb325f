#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    unused_qualifications,
    unused_import_braces
)]
//! Core types for interpreting DICOM data element headers.
//!
//! This crate holds the vocabulary shared by the rest of the `wsdicom`
//! workspace: attribute tags, value representations, value lengths, and the
//! composite element and item headers read off the wire. It contains no
//! I/O; see `wsdicom-encoding` for the decoders and `wsdicom-parser` for
//! the data set walker.

pub mod error;
pub mod header;

pub use error::ErrorKind;
pub use header::{
    DataElementHeader, HasLength, Header, Length, SequenceItemHeader, Tag, VR,
};
