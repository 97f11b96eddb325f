//! The recursive descent over an Explicit VR Little Endian data set.
//!
//! The reader walks the element stream once, from the current stream
//! position through the end of the file, maintaining the tag path of the
//! current nesting position. It descends into every undefined-length
//! construct (no length is known to skip them), while defined-length
//! sequences and items are only entered when the current path shares a
//! prefix with a registered path; otherwise the whole region is seeked
//! past. Every read within a defined-length construct is bounded by the
//! enclosing declared length.

use crate::dataset::{DataSetHandler, HandlerError};
use crate::path::{DepthLimitExceeded, TagPath, TagPathSet};
use crate::source::ValueSource;
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::{Read, Seek, SeekFrom};
use wsdicom_core::header::SequenceItemHeader;
use wsdicom_core::{DataElementHeader, ErrorKind, Header, Tag, VR};
use wsdicom_encoding::decode;
use wsdicom_encoding::decode::ItemEntry;
use wsdicom_encoding::ExplicitVRLittleEndianDecoder;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read element header at {:#x}", position))]
    ReadHeader {
        position: u64,
        #[snafu(backtrace)]
        source: decode::Error,
    },
    #[snafu(display("Could not read item header at {:#x}", position))]
    ReadItemHeader {
        position: u64,
        #[snafu(backtrace)]
        source: decode::Error,
    },
    #[snafu(display(
        "Could not read {} value bytes for element tagged {} at {:#x}",
        len,
        tag,
        position
    ))]
    ReadValue {
        len: u32,
        tag: Tag,
        position: u64,
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Could not skip {} bytes at {:#x}", len, position))]
    SkipValue {
        len: u32,
        position: u64,
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Could not measure the source extent at {:#x}", position))]
    SourceExtent {
        position: u64,
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Premature end of data set inside a defined length at {:#x}", position))]
    PrematureEnd { position: u64, backtrace: Backtrace },
    #[snafu(display(
        "Tag {} at {:#x} is not greater than its predecessor {}",
        tag,
        position,
        previous
    ))]
    OutOfOrderTag {
        tag: Tag,
        previous: Tag,
        position: u64,
        backtrace: Backtrace,
    },
    #[snafu(display("Unexpected delimiter tag {} at {:#x}", tag, position))]
    UnexpectedDelimiter {
        tag: Tag,
        position: u64,
        backtrace: Backtrace,
    },
    #[snafu(display("Tag {} at {:#x} is beyond the pixel data group", tag, position))]
    GroupOutOfRange {
        tag: Tag,
        position: u64,
        backtrace: Backtrace,
    },
    #[snafu(display(
        "Undefined-length {} attribute {} at {:#x} would require Implicit VR support",
        vr,
        tag,
        position
    ))]
    UnsupportedUndefinedLength {
        tag: Tag,
        vr: VR,
        position: u64,
        backtrace: Backtrace,
    },
    #[snafu(display(
        "Undefined length is not legal for {} element {} at {:#x}",
        vr,
        tag,
        position
    ))]
    IllegalUndefinedLength {
        tag: Tag,
        vr: VR,
        position: u64,
        backtrace: Backtrace,
    },
    #[snafu(display("Undefined pixel data fragment length at {:#x}", position))]
    UndefinedFragmentLength { position: u64, backtrace: Backtrace },
    #[snafu(display(
        "Element {} value of {} bytes overruns its enclosing scope ending at {:#x}",
        tag,
        len,
        end
    ))]
    ValueOverrun {
        tag: Tag,
        len: u32,
        end: u64,
        backtrace: Backtrace,
    },
    #[snafu(display(
        "Inconsistent sequence end: expected end at {:#x} but read {:#x}",
        end_of_sequence,
        bytes_read
    ))]
    InconsistentSequenceEnd {
        end_of_sequence: u64,
        bytes_read: u64,
        backtrace: Backtrace,
    },
    #[snafu(display("Nesting limit reached at {:#x}", position))]
    NestingTooDeep {
        position: u64,
        #[snafu(backtrace)]
        source: DepthLimitExceeded,
    },
    #[snafu(display("Handler failed at {:#x}: {}", position, source))]
    HandlerFailure { position: u64, source: HandlerError },
}

impl Error {
    /// The coarse category of this parse failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ReadHeader { source, .. } | Error::ReadItemHeader { source, .. } => {
                source.kind()
            }
            Error::ReadValue { .. }
            | Error::SkipValue { .. }
            | Error::SourceExtent { .. }
            | Error::PrematureEnd { .. }
            | Error::HandlerFailure { .. } => ErrorKind::Io,
            Error::OutOfOrderTag { .. } => ErrorKind::OrderViolation,
            Error::UnexpectedDelimiter { .. }
            | Error::GroupOutOfRange { .. }
            | Error::ValueOverrun { .. }
            | Error::InconsistentSequenceEnd { .. }
            | Error::NestingTooDeep { .. } => ErrorKind::StructuralViolation,
            Error::UnsupportedUndefinedLength { .. } => ErrorKind::UnsupportedSyntax,
            Error::IllegalUndefinedLength { .. } | Error::UndefinedFragmentLength { .. } => {
                ErrorKind::BadHeader
            }
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

/// A streaming reader for the main data set of a DICOM file.
///
/// The reader owns its byte source and a set of registered tag paths, and
/// drives a [`DataSetHandler`] through one full traversal. It performs no
/// allocation during descent; whatever the handlers collect is owned by
/// the handlers.
#[derive(Debug)]
pub struct DataSetReader<S> {
    source: S,
    decoder: ExplicitVRLittleEndianDecoder,
    selection: TagPathSet,
    path: TagPath,
    /// the absolute position of the source, tracked across every read
    position: u64,
    /// the position one past the last byte of the source,
    /// measured when the traversal starts
    max_position: Option<u64>,
}

impl<S> DataSetReader<S>
where
    S: Read + Seek,
{
    /// Create a new data set reader over the given source, with the given
    /// registered path set. The source is assumed to sit at position zero.
    pub fn new(source: S, selection: TagPathSet) -> Self {
        Self::new_at(source, selection, 0)
    }

    /// Create a new data set reader whose source sits at the given
    /// absolute byte offset. Pixel fragment offsets reported to the
    /// handler are absolute, so the offset must be accurate.
    pub fn new_at(source: S, selection: TagPathSet, base_offset: u64) -> Self {
        DataSetReader {
            source,
            decoder: ExplicitVRLittleEndianDecoder::default(),
            selection,
            path: TagPath::new(),
            position: base_offset,
            max_position: None,
        }
    }

    /// The current absolute position of the source, in bytes.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Consume the reader, returning the byte source.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Walk the whole data set, from the current position through the end
    /// of the file, dispatching to `handler`. The successful outcome is
    /// reaching a top-level element boundary where no further header can
    /// be read: the end of the file, or bytes that do not parse as an
    /// explicit header.
    pub fn read_dataset<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: DataSetHandler<S>,
    {
        self.measure_extent()?;
        let mut previous = None;
        while let Some(header) = self.decode_header()? {
            let tag = header.tag;
            if tag.group() == 0xFFFE {
                return UnexpectedDelimiterSnafu {
                    tag,
                    position: self.position,
                }
                .fail();
            }
            if tag.group() > PIXEL_DATA.group() {
                return GroupOutOfRangeSnafu {
                    tag,
                    position: self.position,
                }
                .fail();
            }
            self.check_order(&mut previous, tag)?;
            self.push_tag(tag)?;
            self.read_element_body(&header, None, handler)?;
            self.path.pop();
        }
        Ok(())
    }

    /// Process one element whose header was just read: dispatch its value,
    /// descend into it, or skip it, depending on its shape and on the
    /// registered paths. `end` is the enclosing scope's limit, if the
    /// element lives inside a defined-length construct.
    fn read_element_body<H>(
        &mut self,
        header: &DataElementHeader,
        end: Option<u64>,
        handler: &mut H,
    ) -> Result<()>
    where
        H: DataSetHandler<S>,
    {
        if header.len.is_undefined() {
            return match header.vr {
                VR::SQ => {
                    tracing::trace!(path = %self.path, "descending into sequence");
                    self.dispatch_structural(header, handler)?;
                    self.read_sequence_undef(handler)
                }
                VR::OB | VR::OW if header.is_encapsulated_pixeldata() => {
                    tracing::trace!(path = %self.path, "reading encapsulated pixel data");
                    self.dispatch_structural(header, handler)?;
                    self.read_encapsulated_pixel_data(handler)
                }
                VR::UN => UnsupportedUndefinedLengthSnafu {
                    tag: header.tag,
                    vr: header.vr,
                    position: self.position,
                }
                .fail(),
                vr => IllegalUndefinedLengthSnafu {
                    tag: header.tag,
                    vr,
                    position: self.position,
                }
                .fail(),
            };
        }

        let len = header.len.0;
        if let Some(end) = end {
            if self.position + u64::from(len) > end {
                return ValueOverrunSnafu {
                    tag: header.tag,
                    len,
                    end,
                }
                .fail();
            }
        }

        if header.tag.is_group_length() {
            // deprecated, skipped without interpretation
            return self.skip_bytes(len);
        }

        if header.vr == VR::SQ {
            if self.selection.matches(&self.path) {
                tracing::trace!(path = %self.path, len, "descending into sequence");
                self.read_sequence_def(len, handler)
            } else {
                tracing::trace!(path = %self.path, len, "skipping unselected sequence");
                self.skip_bytes(len)
            }
        } else {
            self.dispatch_value(header, len, handler)
        }
    }

    /// Read an undefined-length sequence: a stream of items closed by a
    /// sequence delimiter.
    fn read_sequence_undef<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: DataSetHandler<S>,
    {
        loop {
            match self.decode_item_header()? {
                SequenceItemHeader::Item { len } if len.is_undefined() => {
                    self.read_item_undef(handler)?;
                }
                SequenceItemHeader::Item { len } => {
                    let len = len.0;
                    if self.selection.matches(&self.path) {
                        self.read_item_def(len, handler)?;
                    } else {
                        tracing::trace!(path = %self.path, len, "skipping unselected item");
                        self.skip_bytes(len)?;
                    }
                }
                SequenceItemHeader::ItemDelimiter => {
                    return UnexpectedDelimiterSnafu {
                        tag: Tag(0xFFFE, 0xE00D),
                        position: self.position,
                    }
                    .fail();
                }
                SequenceItemHeader::SequenceDelimiter => return Ok(()),
            }
        }
    }

    /// Read a defined-length sequence: the item stream consumes exactly
    /// `len` bytes and no sequence delimiter is expected.
    fn read_sequence_def<H>(&mut self, len: u32, handler: &mut H) -> Result<()>
    where
        H: DataSetHandler<S>,
    {
        let end = self.position + u64::from(len);
        while self.position < end {
            match self.decode_item_header()? {
                SequenceItemHeader::Item { len } if len.is_undefined() => {
                    self.read_item_undef(handler)?;
                }
                SequenceItemHeader::Item { len } => {
                    let len = len.0;
                    if self.position + u64::from(len) > end {
                        return ValueOverrunSnafu {
                            tag: Tag(0xFFFE, 0xE000),
                            len,
                            end,
                        }
                        .fail();
                    }
                    if self.selection.matches(&self.path) {
                        self.read_item_def(len, handler)?;
                    } else {
                        tracing::trace!(path = %self.path, len, "skipping unselected item");
                        self.skip_bytes(len)?;
                    }
                }
                other => {
                    return UnexpectedDelimiterSnafu {
                        tag: other.tag(),
                        position: self.position,
                    }
                    .fail();
                }
            }
        }
        if self.position != end {
            return InconsistentSequenceEndSnafu {
                end_of_sequence: end,
                bytes_read: self.position,
            }
            .fail();
        }
        Ok(())
    }

    /// Read an undefined-length item: explicit elements up to an item
    /// delimiter.
    fn read_item_undef<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: DataSetHandler<S>,
    {
        let mut previous = None;
        loop {
            let header = match self.decode_item_entry()? {
                Some(header) => header,
                None => return Ok(()),
            };
            self.check_order(&mut previous, header.tag)?;
            self.push_tag(header.tag)?;
            self.read_element_body(&header, None, handler)?;
            self.path.pop();
        }
    }

    /// Read a defined-length item: explicit elements consuming exactly
    /// `len` bytes, with no terminating delimiter.
    fn read_item_def<H>(&mut self, len: u32, handler: &mut H) -> Result<()>
    where
        H: DataSetHandler<S>,
    {
        let end = self.position + u64::from(len);
        let mut previous = None;
        while self.position < end {
            let header = match self.decode_header()? {
                Some(header) => header,
                None => {
                    return PrematureEndSnafu {
                        position: self.position,
                    }
                    .fail()
                }
            };
            if header.tag.group() == 0xFFFE {
                return UnexpectedDelimiterSnafu {
                    tag: header.tag,
                    position: self.position,
                }
                .fail();
            }
            self.check_order(&mut previous, header.tag)?;
            self.push_tag(header.tag)?;
            self.read_element_body(&header, Some(end), handler)?;
            self.path.pop();
        }
        if self.position != end {
            return InconsistentSequenceEndSnafu {
                end_of_sequence: end,
                bytes_read: self.position,
            }
            .fail();
        }
        Ok(())
    }

    /// Read an encapsulated pixel data element: an item stream where the
    /// first item is the basic offset table and each further item is one
    /// fragment, closed by a sequence delimiter. Fragment data is never
    /// read; only its position and length are reported.
    fn read_encapsulated_pixel_data<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: DataSetHandler<S>,
    {
        let mut offset_table_next = true;
        loop {
            match self.decode_item_header()? {
                SequenceItemHeader::Item { len } => {
                    let len = match len.get() {
                        Some(len) => len,
                        None => {
                            return UndefinedFragmentLengthSnafu {
                                position: self.position,
                            }
                            .fail()
                        }
                    };
                    if offset_table_next {
                        offset_table_next = false;
                        self.check_extent(len)?;
                        let position = self.position;
                        let mut table = ValueSource::new(&mut self.source, len);
                        let outcome = handler.offset_table(&self.path, &mut table);
                        outcome.context(HandlerFailureSnafu { position })?;
                        table.skip_to_end().context(ReadValueSnafu {
                            len,
                            tag: PIXEL_DATA,
                            position,
                        })?;
                        self.position += u64::from(len);
                    } else {
                        handler
                            .pixel_fragment(&self.path, self.position, len)
                            .context(HandlerFailureSnafu {
                                position: self.position,
                            })?;
                        self.skip_bytes(len)?;
                    }
                }
                SequenceItemHeader::ItemDelimiter => {
                    return UnexpectedDelimiterSnafu {
                        tag: Tag(0xFFFE, 0xE00D),
                        position: self.position,
                    }
                    .fail();
                }
                SequenceItemHeader::SequenceDelimiter => return Ok(()),
            }
        }
    }

    /// Dispatch a structural attribute (undefined-length sequence or
    /// encapsulated pixel data), which carries no value source.
    fn dispatch_structural<H>(&mut self, header: &DataElementHeader, handler: &mut H) -> Result<()>
    where
        H: DataSetHandler<S>,
    {
        handler
            .attribute(&self.path, header, None)
            .context(HandlerFailureSnafu {
                position: self.position,
            })
    }

    /// Dispatch an ordinary attribute with a value source bounded to its
    /// declared length, then realign the stream to the element boundary
    /// irrespective of how much the handler consumed.
    fn dispatch_value<H>(
        &mut self,
        header: &DataElementHeader,
        len: u32,
        handler: &mut H,
    ) -> Result<()>
    where
        H: DataSetHandler<S>,
    {
        self.check_extent(len)?;
        let position = self.position;
        let mut value = ValueSource::new(&mut self.source, len);
        let outcome = handler.attribute(&self.path, header, Some(&mut value));
        outcome.context(HandlerFailureSnafu { position })?;
        value.skip_to_end().context(ReadValueSnafu {
            len,
            tag: header.tag,
            position,
        })?;
        self.position += u64::from(len);
        Ok(())
    }

    fn decode_header(&mut self) -> Result<Option<DataElementHeader>> {
        let position = self.position;
        match self
            .decoder
            .decode_header(&mut self.source)
            .context(ReadHeaderSnafu { position })?
        {
            Some((header, bytes_read)) => {
                self.position += bytes_read as u64;
                Ok(Some(header))
            }
            None => Ok(None),
        }
    }

    /// Read the next entry inside an undefined-length item; `None` means
    /// the item delimiter was reached.
    fn decode_item_entry(&mut self) -> Result<Option<DataElementHeader>> {
        let position = self.position;
        match self
            .decoder
            .decode_header_or_item_delimiter(&mut self.source)
            .context(ReadHeaderSnafu { position })?
        {
            ItemEntry::Element(header, bytes_read) => {
                self.position += bytes_read as u64;
                Ok(Some(header))
            }
            ItemEntry::Delimiter => {
                self.position += 8;
                Ok(None)
            }
        }
    }

    fn decode_item_header(&mut self) -> Result<SequenceItemHeader> {
        let position = self.position;
        let header = self
            .decoder
            .decode_item_header(&mut self.source)
            .context(ReadItemHeaderSnafu { position })?;
        self.position += 8;
        Ok(header)
    }

    fn skip_bytes(&mut self, len: u32) -> Result<()> {
        self.check_extent(len)?;
        if len > 0 {
            self.source
                .seek(SeekFrom::Current(i64::from(len)))
                .context(SkipValueSnafu {
                    len,
                    position: self.position,
                })?;
        }
        self.position += u64::from(len);
        Ok(())
    }

    /// Measure how many bytes the source still holds, so that skips over
    /// declared lengths cannot silently move past the end of the file.
    fn measure_extent(&mut self) -> Result<()> {
        let context = SourceExtentSnafu {
            position: self.position,
        };
        let current = self.source.stream_position().context(context)?;
        let end = self.source.seek(SeekFrom::End(0)).context(context)?;
        self.source.seek(SeekFrom::Start(current)).context(context)?;
        self.max_position = Some(self.position + end.saturating_sub(current));
        Ok(())
    }

    /// Guard that `len` more value bytes exist in the source.
    fn check_extent(&self, len: u32) -> Result<()> {
        if let Some(max) = self.max_position {
            if self.position + u64::from(len) > max {
                return PrematureEndSnafu {
                    position: self.position,
                }
                .fail();
            }
        }
        Ok(())
    }

    /// Enforce strictly increasing tags within the current scope.
    fn check_order(&self, previous: &mut Option<Tag>, tag: Tag) -> Result<()> {
        if let Some(previous) = *previous {
            if tag <= previous {
                return OutOfOrderTagSnafu {
                    tag,
                    previous,
                    position: self.position,
                }
                .fail();
            }
        }
        *previous = Some(tag);
        Ok(())
    }

    fn push_tag(&mut self, tag: Tag) -> Result<()> {
        self.path.push(tag).context(NestingTooDeepSnafu {
            position: self.position,
        })
    }
}
