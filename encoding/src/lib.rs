#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    unused_qualifications,
    unused_import_braces
)]
//! DICOM decoding primitives for the Explicit VR Little Endian transfer
//! syntax.
//!
//! This crate reads data element headers off a byte source in the three
//! framings that occur in an Explicit VR Little Endian stream:
//!
//! - the strict explicit framing of the main data set and of defined-length
//!   items;
//! - the explicit framing with an item delimiter fast path, used inside
//!   undefined-length items;
//! - the implicit framing of the `(FFFE,xxxx)` sequence item delimiters,
//!   which carry no value representation.
//!
//! All APIs are based on synchronous I/O.

pub mod decode;

pub use decode::explicit_le::ExplicitVRLittleEndianDecoder;
pub use decode::ItemEntry;
