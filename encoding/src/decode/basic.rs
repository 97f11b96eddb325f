//! This module provides the decoder of primitive binary values, which in
//! this subset of DICOM are always in little endian.

use byteordered::ByteOrdered;
use std::io::Read;
use wsdicom_core::Tag;

type Result<T> = std::io::Result<T>;

/// A basic decoder of DICOM primitive values in little endian.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct LittleEndianBasicDecoder;

impl LittleEndianBasicDecoder {
    /// Decode an unsigned short value from the given source.
    pub fn decode_us<S>(&self, source: S) -> Result<u16>
    where
        S: Read,
    {
        ByteOrdered::le(source).read_u16()
    }

    /// Decode an unsigned long value from the given source.
    pub fn decode_ul<S>(&self, source: S) -> Result<u32>
    where
        S: Read,
    {
        ByteOrdered::le(source).read_u32()
    }

    /// Decode a DICOM attribute tag from the given source.
    pub fn decode_tag<S>(&self, mut source: S) -> Result<Tag>
    where
        S: Read,
    {
        let g = self.decode_us(&mut source)?;
        let e = self.decode_us(source)?;
        Ok(Tag(g, e))
    }
}
