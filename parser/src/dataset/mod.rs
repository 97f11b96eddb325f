//! This module contains the mid-level abstraction for reading DICOM
//! content sequentially: the recursive data set walker and the handler
//! capability it dispatches to.

use crate::path::TagPath;
use crate::source::ValueSource;
use wsdicom_core::DataElementHeader;

pub mod read;

pub use self::read::DataSetReader;

/// The error type a handler may fail with. The walker aborts the parse on
/// the first handler failure and carries the error to the caller.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The capability the walker dispatches to while traversing a data set.
///
/// The type parameter `S` is the underlying byte source of the walker;
/// value sources handed to the handler borrow it for the duration of the
/// call.
pub trait DataSetHandler<S> {
    /// Called for every attribute the walker traverses.
    ///
    /// `value` is a source bounded to the element's declared length, or
    /// `None` when the value is structural (an undefined-length sequence
    /// or encapsulated pixel data). The handler may read any amount of the
    /// value; the walker realigns the stream to the element boundary
    /// afterwards. Data to be retained must be copied out.
    fn attribute(
        &mut self,
        path: &TagPath,
        header: &DataElementHeader,
        value: Option<&mut ValueSource<'_, S>>,
    ) -> Result<(), HandlerError>;

    /// Called for every encapsulated pixel data fragment past the basic
    /// offset table, with the absolute byte offset and length of the
    /// fragment data. The fragment bytes themselves are not read.
    fn pixel_fragment(
        &mut self,
        _path: &TagPath,
        _offset: u64,
        _length: u32,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Called with the contents of the basic offset table, the first item
    /// of an encapsulated pixel data element. The default implementation
    /// leaves it unread, which discards it.
    fn offset_table(
        &mut self,
        _path: &TagPath,
        _table: &mut ValueSource<'_, S>,
    ) -> Result<(), HandlerError> {
        Ok(())
    }
}
