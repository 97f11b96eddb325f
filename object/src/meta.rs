//! Module containing the readers of the DICOM file preamble and of the
//! file meta information group.

use byteordered::byteorder::{ByteOrder, LittleEndian};
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::{Read, Seek, SeekFrom};
use wsdicom_core::{ErrorKind, Header, Length, Tag, VR};
use wsdicom_encoding::decode;
use wsdicom_encoding::ExplicitVRLittleEndianDecoder;

const DICM_MAGIC_CODE: [u8; 4] = [b'D', b'I', b'C', b'M'];

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not reach the magic code: {}", source))]
    SeekPreamble {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Could not read the magic code: {}", source))]
    ReadMagicCode {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Bad magic code {:?}, not a DICOM file", magic))]
    BadMagicCode { magic: [u8; 4], backtrace: Backtrace },
    #[snafu(display("Could not decode file meta element header"))]
    DecodeHeader {
        #[snafu(backtrace)]
        source: decode::Error,
    },
    #[snafu(display("Premature end of file inside the file meta group"))]
    PrematureEnd { backtrace: Backtrace },
    #[snafu(display("Unexpected file meta tag {}", tag))]
    UnexpectedTag { tag: Tag, backtrace: Backtrace },
    #[snafu(display("Unexpected VR {} for file meta element {}", vr, tag))]
    UnexpectedVr {
        vr: VR,
        tag: Tag,
        backtrace: Backtrace,
    },
    #[snafu(display("Unexpected length {} for file meta element {}", len, tag))]
    UnexpectedLength {
        len: Length,
        tag: Tag,
        backtrace: Backtrace,
    },
    #[snafu(display("File meta group length does not cover its elements"))]
    InconsistentGroupLength { backtrace: Backtrace },
    #[snafu(display("Could not read file meta value: {}", source))]
    ReadValue {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Could not skip file meta value: {}", source))]
    SkipValue {
        source: std::io::Error,
        backtrace: Backtrace,
    },
}

impl Error {
    /// The coarse category of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SeekPreamble { .. }
            | Error::ReadMagicCode { .. }
            | Error::PrematureEnd { .. }
            | Error::ReadValue { .. }
            | Error::SkipValue { .. } => ErrorKind::Io,
            Error::BadMagicCode { .. } => ErrorKind::BadMagic,
            Error::DecodeHeader { source } => source.kind(),
            Error::UnexpectedTag { .. }
            | Error::UnexpectedVr { .. }
            | Error::UnexpectedLength { .. } => ErrorKind::BadHeader,
            Error::InconsistentGroupLength { .. } => ErrorKind::StructuralViolation,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Skip the 128-byte preamble and check the `DICM` magic code.
pub fn read_preamble<S>(source: &mut S) -> Result<()>
where
    S: Read + Seek,
{
    source
        .seek(SeekFrom::Start(128))
        .context(SeekPreambleSnafu)?;
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf).context(ReadMagicCodeSnafu)?;
    if buf != DICM_MAGIC_CODE {
        return BadMagicCodeSnafu { magic: buf }.fail();
    }
    Ok(())
}

/// The relevant part of the DICOM file meta information group.
///
/// Only the attributes of interest to the whole-slide workflow are
/// captured; all remaining elements of the group are length-skipped.
/// Captured UID values are right-trimmed of padding.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaTable {
    /// File Meta Information Group Length
    pub information_group_length: u32,
    /// Media Storage SOP Class UID
    pub media_storage_sop_class_uid: Option<String>,
    /// Media Storage SOP Instance UID
    pub media_storage_sop_instance_uid: Option<String>,
    /// Transfer Syntax UID
    pub transfer_syntax: Option<String>,
}

impl FileMetaTable {
    /// Read the file meta group from a source positioned right after the
    /// magic code. On return, the source sits at the first byte of the
    /// main data set.
    pub fn from_reader<S>(source: &mut S) -> Result<Self>
    where
        S: Read + Seek,
    {
        let decoder = ExplicitVRLittleEndianDecoder::default();

        // (0002,0000) UL 4: the byte length of the rest of the group
        let (elem, _) = decoder
            .decode_header(source)
            .context(DecodeHeaderSnafu)?
            .ok_or_else(|| PrematureEndSnafu.build())?;
        if elem.tag() != Tag(0x0002, 0x0000) {
            return UnexpectedTagSnafu { tag: elem.tag() }.fail();
        }
        if elem.vr() != VR::UL {
            return UnexpectedVrSnafu {
                vr: elem.vr(),
                tag: elem.tag(),
            }
            .fail();
        }
        if elem.len != Length(4) {
            return UnexpectedLengthSnafu {
                len: elem.len,
                tag: elem.tag(),
            }
            .fail();
        }
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).context(ReadValueSnafu)?;
        let group_length = LittleEndian::read_u32(&buf);

        let mut table = FileMetaTable {
            information_group_length: group_length,
            media_storage_sop_class_uid: None,
            media_storage_sop_instance_uid: None,
            transfer_syntax: None,
        };

        let mut remaining = group_length;
        while remaining > 0 {
            let (elem, bytes_read) = decoder
                .decode_header(source)
                .context(DecodeHeaderSnafu)?
                .ok_or_else(|| PrematureEndSnafu.build())?;
            let len = match elem.len.get() {
                Some(len) => len,
                None => {
                    return UnexpectedLengthSnafu {
                        len: elem.len,
                        tag: elem.tag(),
                    }
                    .fail()
                }
            };
            match elem.tag() {
                Tag(0x0002, 0x0002) => {
                    table.media_storage_sop_class_uid = Some(read_uid(source, len)?);
                }
                Tag(0x0002, 0x0003) => {
                    table.media_storage_sop_instance_uid = Some(read_uid(source, len)?);
                }
                Tag(0x0002, 0x0010) => {
                    table.transfer_syntax = Some(read_uid(source, len)?);
                }
                _ => {
                    if len > 0 {
                        source
                            .seek(SeekFrom::Current(i64::from(len)))
                            .context(SkipValueSnafu)?;
                    }
                }
            }
            remaining = remaining
                .checked_sub(bytes_read as u32 + len)
                .ok_or_else(|| InconsistentGroupLengthSnafu.build())?;
        }

        Ok(table)
    }
}

/// Read a UID-like text value and right-trim its padding.
fn read_uid<S>(source: &mut S, len: u32) -> Result<String>
where
    S: Read,
{
    let mut buf = vec![0u8; len as usize];
    source.read_exact(&mut buf).context(ReadValueSnafu)?;
    let text = String::from_utf8_lossy(&buf);
    Ok(text.trim_end_matches(&['\0', ' '][..]).to_string())
}
