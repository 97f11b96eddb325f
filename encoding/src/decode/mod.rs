//! This module contains all DICOM data element decoding logic.

use snafu::{Backtrace, Snafu};
use std::io;
use wsdicom_core::{DataElementHeader, ErrorKind, Tag};

pub mod basic;
pub mod explicit_le;

/// Module-level error type:
/// for errors which may occur while decoding DICOM data.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Failed to read the beginning (tag) of the header: {}", source))]
    ReadHeaderTag {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the item header: {}", source))]
    ReadItemHeader {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's item length field: {}", source))]
    ReadItemLength {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's reserved bytes: {}", source))]
    ReadReserved {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's element length field: {}", source))]
    ReadLength {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Failed to read the header's value representation: {}", source))]
    ReadVr {
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display(
        "Invalid value representation bytes [{:#04X}, {:#04X}]",
        bytes[0],
        bytes[1]
    ))]
    InvalidVr { bytes: [u8; 2], backtrace: Backtrace },
    #[snafu(display(
        "Non-zero reserved word {:#06X} in long form header of {}",
        word,
        tag
    ))]
    ReservedNotZero {
        word: u16,
        tag: Tag,
        backtrace: Backtrace,
    },
    #[snafu(display("Unexpected delimiter tag {} among item elements", tag))]
    UnexpectedDelimiter { tag: Tag, backtrace: Backtrace },
    #[snafu(display("Bad sequence item header: {}", source))]
    BadSequenceHeader {
        source: wsdicom_core::header::SequenceItemHeaderError,
    },
}

impl Error {
    /// The coarse category of this decoding failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ReadHeaderTag { .. }
            | Error::ReadItemHeader { .. }
            | Error::ReadItemLength { .. }
            | Error::ReadReserved { .. }
            | Error::ReadLength { .. }
            | Error::ReadVr { .. } => ErrorKind::Io,
            Error::InvalidVr { .. }
            | Error::ReservedNotZero { .. }
            | Error::BadSequenceHeader { .. } => ErrorKind::BadHeader,
            Error::UnexpectedDelimiter { .. } => ErrorKind::StructuralViolation,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The outcome of reading one entry inside an undefined-length item:
/// either a regular data element header, or the item delimitation item
/// which closes the item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemEntry {
    /// A regular data element header, and the number of header bytes read.
    Element(DataElementHeader, usize),
    /// The `(FFFE,E00D)` item delimitation item.
    Delimiter,
}
