//! The coarse error classification shared by the reading stack.

use std::fmt;

/// A broad category for errors raised while reading DICOM content.
///
/// Every error type in the workspace exposes a `kind` method mapping the
/// concrete failure to one of these categories, so that callers can react
/// to the class of failure without matching on crate-specific variants.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An underlying read, seek, or open failed,
    /// or the end of the file arrived inside a declared length.
    Io,
    /// The `DICM` magic code check failed.
    BadMagic,
    /// A malformed element or delimiter header:
    /// value representation bytes outside `A`-`Z`,
    /// a non-zero reserved word on a long-form header,
    /// or a delimiter carrying a non-zero length.
    BadHeader,
    /// Tags were not strictly increasing within a scope.
    OrderViolation,
    /// The content requires a transfer syntax outside the supported
    /// subset, such as an undefined-length `UN` attribute.
    UnsupportedSyntax,
    /// Nesting did not close where the declared lengths said it would,
    /// or a delimiter appeared where an element was expected.
    StructuralViolation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ErrorKind::Io => "I/O failure",
            ErrorKind::BadMagic => "bad magic code",
            ErrorKind::BadHeader => "bad element header",
            ErrorKind::OrderViolation => "tag ordering violation",
            ErrorKind::UnsupportedSyntax => "unsupported transfer syntax",
            ErrorKind::StructuralViolation => "structural violation",
        };
        f.write_str(name)
    }
}
