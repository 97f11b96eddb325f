#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    unused_qualifications,
    unused_import_braces
)]
//! This crate works on top of the `wsdicom` decoding primitives to walk a
//! DICOM data set in a single pass.
//!
//! The walker keeps a [tag path](crate::path::TagPath) naming the current
//! nesting position, descends into every undefined-length construct, and
//! consults a caller-registered [path set](crate::path::TagPathSet) to
//! decide whether a defined-length sequence or item is worth descending
//! into — unselected regions are seeked past without allocation. Attribute
//! values and encapsulated pixel-data fragments are dispatched to a
//! caller-supplied [handler](crate::dataset::DataSetHandler).
//!
//! For the time being, all APIs are based on synchronous I/O.

pub mod dataset;
pub mod path;
pub mod source;

pub use dataset::read::DataSetReader;
pub use dataset::{DataSetHandler, HandlerError};
pub use path::{TagPath, TagPathSet};
pub use source::ValueSource;
