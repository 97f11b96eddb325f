//! Explicit VR Little Endian header decoding.
//!
//! The decoder in this module reads data element headers in the three
//! framings of this transfer syntax: strict explicit VR, explicit VR with
//! the item delimiter fast path, and the implicit framing reserved for the
//! `(FFFE,xxxx)` sequence item delimiters.

use crate::decode::{ItemEntry, Result};
use crate::decode::{
    BadSequenceHeaderSnafu, InvalidVrSnafu, ReadHeaderTagSnafu, ReadItemHeaderSnafu,
    ReadItemLengthSnafu, ReadLengthSnafu, ReadReservedSnafu, ReadVrSnafu, ReservedNotZeroSnafu,
    UnexpectedDelimiterSnafu,
};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use snafu::ResultExt;
use std::io::{self, Read};
use wsdicom_core::header::SequenceItemHeader;
use wsdicom_core::{DataElementHeader, Length, Tag, VR};

const ITEM_DELIMITER: Tag = Tag(0xFFFE, 0xE00D);

/// A data element decoder for the Explicit VR Little Endian transfer syntax.
#[derive(Debug, Default, Clone)]
pub struct ExplicitVRLittleEndianDecoder;

impl ExplicitVRLittleEndianDecoder {
    /// Decode one data element header in strict explicit framing, as found
    /// at the top of the main data set and within defined-length items.
    ///
    /// Returns `Ok(None)` when the bytes at the cursor are not an element
    /// header: the source is exhausted exactly at the header boundary, or
    /// the value representation bytes are not uppercase ASCII letters.
    /// This soft stop is how a data set read through the end of the file
    /// terminates. An end of stream in the middle of a header is an error.
    ///
    /// Headers with a tag in the delimiter group `0xFFFE` have no value
    /// representation on the wire; they are returned with a `UN` sentinel
    /// and their 32-bit length, so that the caller can reject them in
    /// contexts where a delimiter is illegal.
    pub fn decode_header<S>(&self, source: &mut S) -> Result<Option<(DataElementHeader, usize)>>
    where
        S: ?Sized + Read,
    {
        let tag = match self.decode_tag_or_eof(source)? {
            Some(tag) => tag,
            None => return Ok(None),
        };

        let mut buf = [0u8; 4];
        if tag.group() == 0xFFFE {
            // item delimiters do not have VR or reserved field
            source.read_exact(&mut buf).context(ReadItemLengthSnafu)?;
            let len = LittleEndian::read_u32(&buf);
            return Ok(Some((
                DataElementHeader::new(tag, VR::UN, Length(len)),
                8, // tag + len
            )));
        }

        source.read_exact(&mut buf[0..2]).context(ReadVrSnafu)?;
        let vr = match Self::interpret_vr([buf[0], buf[1]]) {
            Some(vr) => vr,
            // not an element header; stop as if at the end of the stream
            None => return Ok(None),
        };
        let (len, tail) = self.decode_length(source, tag, vr)?;
        Ok(Some((DataElementHeader::new(tag, vr, len), 6 + tail)))
    }

    /// Decode one entry inside an undefined-length item: either a data
    /// element header in explicit framing, or the `(FFFE,E00D)` item
    /// delimitation item closing the item, which is framed as tag plus a
    /// 32-bit length that must be zero.
    pub fn decode_header_or_item_delimiter<S>(&self, source: &mut S) -> Result<ItemEntry>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).context(ReadHeaderTagSnafu)?;
        let tag = Tag(
            LittleEndian::read_u16(&buf[0..2]),
            LittleEndian::read_u16(&buf[2..4]),
        );

        if tag == ITEM_DELIMITER {
            source.read_exact(&mut buf).context(ReadItemLengthSnafu)?;
            let len = LittleEndian::read_u32(&buf);
            SequenceItemHeader::new(tag, Length(len)).context(BadSequenceHeaderSnafu)?;
            return Ok(ItemEntry::Delimiter);
        }
        if tag.group() == 0xFFFE {
            return UnexpectedDelimiterSnafu { tag }.fail();
        }

        source.read_exact(&mut buf[0..2]).context(ReadVrSnafu)?;
        let vr = match Self::interpret_vr([buf[0], buf[1]]) {
            Some(vr) => vr,
            // no soft stop inside an undefined-length item
            None => {
                return InvalidVrSnafu {
                    bytes: [buf[0], buf[1]],
                }
                .fail()
            }
        };
        let (len, tail) = self.decode_length(source, tag, vr)?;
        Ok(ItemEntry::Element(
            DataElementHeader::new(tag, vr, len),
            6 + tail,
        ))
    }

    /// Decode a sequence item delimiter header in implicit framing:
    /// `tag(4) | VL(4)`, with no value representation. This is the only
    /// way headers of the `0xFFFE` group are meant to be read.
    pub fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 8];
        source.read_exact(&mut buf).context(ReadItemHeaderSnafu)?;
        let tag = Tag(
            LittleEndian::read_u16(&buf[0..2]),
            LittleEndian::read_u16(&buf[2..4]),
        );
        let len = LittleEndian::read_u32(&buf[4..8]);

        SequenceItemHeader::new(tag, Length(len)).context(BadSequenceHeaderSnafu)
    }

    /// Read a tag, reporting `None` on a clean end of stream at the tag
    /// boundary and an error if the stream ends mid-tag.
    fn decode_tag_or_eof<S>(&self, source: &mut S) -> Result<Option<Tag>>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 4];
        let mut bytes_read = 0;
        while bytes_read < buf.len() {
            match source.read(&mut buf[bytes_read..]) {
                Ok(0) if bytes_read == 0 => return Ok(None),
                Ok(0) => {
                    return Err(io::Error::from(io::ErrorKind::UnexpectedEof))
                        .context(ReadHeaderTagSnafu)
                }
                Ok(n) => bytes_read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context(ReadHeaderTagSnafu),
            }
        }
        Ok(Some(Tag(
            LittleEndian::read_u16(&buf[0..2]),
            LittleEndian::read_u16(&buf[2..4]),
        )))
    }

    /// Interpret two header bytes as a value representation, or `None` if
    /// they are not both uppercase ASCII letters. An unrecognized pair of
    /// letters may come from a newer edition of the standard; it is mapped
    /// to `UN` and framed in the long form.
    fn interpret_vr(bytes: [u8; 2]) -> Option<VR> {
        if !bytes[0].is_ascii_uppercase() || !bytes[1].is_ascii_uppercase() {
            return None;
        }
        Some(VR::from_binary(bytes).unwrap_or(VR::UN))
    }

    /// Read the value length field(s) following the representation.
    /// Returns the length and the number of bytes consumed (2 for the
    /// short form, 6 for the long form).
    fn decode_length<S>(&self, source: &mut S, tag: Tag, vr: VR) -> Result<(Length, usize)>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 4];
        if vr.is_short_form() {
            source.read_exact(&mut buf[0..2]).context(ReadLengthSnafu)?;
            let len = u32::from(LittleEndian::read_u16(&buf[0..2]));
            Ok((Length(len), 2))
        } else {
            source.read_exact(&mut buf[0..2]).context(ReadReservedSnafu)?;
            let word = LittleEndian::read_u16(&buf[0..2]);
            if word != 0 {
                return ReservedNotZeroSnafu { word, tag }.fail();
            }
            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            let len = LittleEndian::read_u32(&buf);
            Ok((Length(len), 6))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ExplicitVRLittleEndianDecoder;
    use crate::decode::{Error, ItemEntry};
    use std::io::{Cursor, Read, Seek, SeekFrom};
    use wsdicom_core::{HasLength, Header, Length, Tag, VR};

    // manually crafting some DICOM data elements
    //  Tag: (0002,0002) Media Storage SOP Class UID
    //  VR: UI
    //  Length: 26
    //  Value: "1.2.840.10008.5.1.4.1.1.1\0"
    // --
    //  Tag: (0002,0010) Transfer Syntax UID
    //  VR: UI
    //  Length: 20
    //  Value: "1.2.840.10008.1.2.1\0" == ExplicitVRLittleEndian
    // --
    const RAW: &[u8; 62] = &[
        0x02, 0x00, 0x02, 0x00, 0x55, 0x49, 0x1a, 0x00, 0x31, 0x2e, 0x32, 0x2e, 0x38, 0x34, 0x30,
        0x2e, 0x31, 0x30, 0x30, 0x30, 0x38, 0x2e, 0x35, 0x2e, 0x31, 0x2e, 0x34, 0x2e, 0x31, 0x2e,
        0x31, 0x2e, 0x31, 0x00, 0x02, 0x00, 0x10, 0x00, 0x55, 0x49, 0x14, 0x00, 0x31, 0x2e, 0x32,
        0x2e, 0x38, 0x34, 0x30, 0x2e, 0x31, 0x30, 0x30, 0x30, 0x38, 0x2e, 0x31, 0x2e, 0x32, 0x2e,
        0x31, 0x00,
    ];

    #[test]
    fn decode_data_elements() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        let mut cursor = Cursor::new(RAW.as_ref());
        {
            // read first element
            let (elem, bytes_read) = dec
                .decode_header(&mut cursor)
                .expect("should not fail")
                .expect("should find an element");
            assert_eq!(elem.tag(), Tag(2, 2));
            assert_eq!(elem.vr(), VR::UI);
            assert_eq!(elem.length(), Length(26));
            assert_eq!(bytes_read, 8);
            // read only half of the value data
            let mut buffer = [0; 13];
            cursor.read_exact(&mut buffer).expect("should read it fine");
            assert_eq!(&buffer, b"1.2.840.10008".as_ref());
        }
        // cursor should now be @ #21 (there is no automatic skipping)
        assert_eq!(cursor.seek(SeekFrom::Current(0)).unwrap(), 21);
        // cursor should now be @ #34 after skipping
        assert_eq!(cursor.seek(SeekFrom::Current(13)).unwrap(), 34);
        {
            // read second element
            let (elem, _bytes_read) = dec
                .decode_header(&mut cursor)
                .expect("should not fail")
                .expect("should find an element");
            assert_eq!(elem.tag(), Tag(2, 16));
            assert_eq!(elem.vr(), VR::UI);
            assert_eq!(elem.length(), Length(20));
            // read all data
            let mut buffer = [0; 20];
            cursor.read_exact(&mut buffer).expect("should read it fine");
            assert_eq!(&buffer, b"1.2.840.10008.1.2.1\0".as_ref());
        }
        // the source is exhausted at a header boundary
        assert!(dec.decode_header(&mut cursor).unwrap().is_none());
    }

    // manually crafting some DICOM sequence/item delimiters
    //  Tag: (0008,103F) Series Description Code Sequence
    //  VR: SQ
    //  Reserved bytes: 0x0000
    //  Length: 0xFFFF_FFFF
    // --
    //  Tag: (FFFE,E000) Item
    //  Length: 0xFFFF_FFFF (unspecified)
    // --
    //  Tag: (FFFE,E00D) Item Delimitation Item
    //  Length: 0
    // --
    //  Tag: (FFFE,E0DD) Sequence Delimitation Item
    //  Length: 0
    // --
    const RAW_SEQUENCE_ITEMS: &[u8] = &[
        0x08, 0x00, 0x3F, 0x10, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0xFF, 0x00,
        0xE0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00, 0xFE, 0xFF,
        0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn decode_items() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        let mut cursor = Cursor::new(RAW_SEQUENCE_ITEMS);
        {
            // read first element
            let (elem, bytes_read) = dec
                .decode_header(&mut cursor)
                .expect("should not fail")
                .expect("should find an element header");
            assert_eq!(elem.tag(), Tag(8, 0x103F));
            assert_eq!(elem.vr(), VR::SQ);
            assert!(elem.length().is_undefined());
            assert_eq!(bytes_read, 12);
        }
        // cursor should now be @ #12
        assert_eq!(cursor.seek(SeekFrom::Current(0)).unwrap(), 12);
        {
            let elem = dec
                .decode_item_header(&mut cursor)
                .expect("should find an item header");
            assert!(elem.is_item());
            assert_eq!(elem.tag(), Tag(0xFFFE, 0xE000));
            assert!(elem.length().is_undefined());
        }
        // cursor should now be @ #20
        assert_eq!(cursor.seek(SeekFrom::Current(0)).unwrap(), 20);
        {
            let elem = dec
                .decode_item_header(&mut cursor)
                .expect("should find an item header");
            assert!(elem.is_item_delimiter());
            assert_eq!(elem.tag(), Tag(0xFFFE, 0xE00D));
            assert_eq!(elem.length(), Length(0));
        }
        // cursor should now be @ #28
        assert_eq!(cursor.seek(SeekFrom::Current(0)).unwrap(), 28);
        {
            let elem = dec
                .decode_item_header(&mut cursor)
                .expect("should find an item header");
            assert!(elem.is_sequence_delimiter());
            assert_eq!(elem.tag(), Tag(0xFFFE, 0xE0DD));
            assert_eq!(elem.length(), Length(0));
        }
    }

    #[test]
    fn decode_item_delimiter_fast_path() {
        let dec = ExplicitVRLittleEndianDecoder::default();

        //  (0008,0018) UI, length 2, "1\0" followed by (FFFE,E00D)
        const RAW_IN_ITEM: &[u8] = &[
            0x08, 0x00, 0x18, 0x00, b'U', b'I', 0x02, 0x00, b'1', 0x00, 0xFE, 0xFF, 0x0D, 0xE0,
            0x00, 0x00, 0x00, 0x00,
        ];
        let mut cursor = Cursor::new(RAW_IN_ITEM);

        match dec.decode_header_or_item_delimiter(&mut cursor).unwrap() {
            ItemEntry::Element(elem, bytes_read) => {
                assert_eq!(elem.tag(), Tag(0x0008, 0x0018));
                assert_eq!(elem.vr(), VR::UI);
                assert_eq!(elem.length(), Length(2));
                assert_eq!(bytes_read, 8);
            }
            entry => panic!("unexpected entry {:?}", entry),
        }
        cursor.seek(SeekFrom::Current(2)).unwrap();
        assert_eq!(
            dec.decode_header_or_item_delimiter(&mut cursor).unwrap(),
            ItemEntry::Delimiter
        );
    }

    #[test]
    fn reject_item_delimiter_with_length() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        //  (FFFE,E00D) with a bogus length of 4
        const RAW_BAD_DELIMITER: &[u8] = &[0xFE, 0xFF, 0x0D, 0xE0, 0x04, 0x00, 0x00, 0x00];

        let mut cursor = Cursor::new(RAW_BAD_DELIMITER);
        assert!(matches!(
            dec.decode_header_or_item_delimiter(&mut cursor),
            Err(Error::BadSequenceHeader { .. })
        ));

        let mut cursor = Cursor::new(RAW_BAD_DELIMITER);
        assert!(matches!(
            dec.decode_item_header(&mut cursor),
            Err(Error::BadSequenceHeader { .. })
        ));
    }

    //  (0008,0018) with VR bytes that are not uppercase ASCII
    const RAW_BAD_VR: &[u8] = &[0x08, 0x00, 0x18, 0x00, 0x75, 0x21, 0x02, 0x00];

    #[test]
    fn invalid_vr_bytes_stop_the_strict_framing() {
        let dec = ExplicitVRLittleEndianDecoder::default();

        // not an element header: the same soft stop as a clean end of
        // stream, which is what ends a read through the end of the file
        let mut cursor = Cursor::new(RAW_BAD_VR);
        assert!(dec.decode_header(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn invalid_vr_bytes_in_an_item_are_rejected() {
        let dec = ExplicitVRLittleEndianDecoder::default();

        let mut cursor = Cursor::new(RAW_BAD_VR);
        assert!(matches!(
            dec.decode_header_or_item_delimiter(&mut cursor),
            Err(Error::InvalidVr {
                bytes: [0x75, 0x21],
                ..
            })
        ));
    }

    #[test]
    fn reject_non_zero_reserved_word() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        //  (7FE0,0010) OB with a non-zero reserved word
        const RAW_BAD_RESERVED: &[u8] = &[
            0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x01, 0x00, 0x00, 0x01, 0x00, 0x00,
        ];

        let mut cursor = Cursor::new(RAW_BAD_RESERVED);
        assert!(matches!(
            dec.decode_header(&mut cursor),
            Err(Error::ReservedNotZero { word: 1, .. })
        ));
    }

    #[test]
    fn unknown_vr_uses_long_form() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        //  (0009,0001) with the made-up VR "XX", long form, length 6
        const RAW_UNKNOWN_VR: &[u8] = &[
            0x09, 0x00, 0x01, 0x00, b'X', b'X', 0x00, 0x00, 0x06, 0x00, 0x00, 0x00,
        ];

        let mut cursor = Cursor::new(RAW_UNKNOWN_VR);
        let (elem, bytes_read) = dec.decode_header(&mut cursor).unwrap().unwrap();
        assert_eq!(elem.tag(), Tag(0x0009, 0x0001));
        assert_eq!(elem.vr(), VR::UN);
        assert_eq!(elem.length(), Length(6));
        assert_eq!(bytes_read, 12);
    }

    #[test]
    fn item_delimiter_among_item_elements_is_rejected() {
        let dec = ExplicitVRLittleEndianDecoder::default();
        //  (FFFE,E000) where an element was expected
        const RAW_ITEM_START: &[u8] = &[0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF];

        let mut cursor = Cursor::new(RAW_ITEM_START);
        assert!(matches!(
            dec.decode_header_or_item_delimiter(&mut cursor),
            Err(Error::UnexpectedDelimiter {
                tag: Tag(0xFFFE, 0xE000),
                ..
            })
        ));
    }
}
