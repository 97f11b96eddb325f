//! Reading a whole DICOM file: preamble, file meta group, and the main
//! data set traversal.

use crate::meta::{self, FileMetaTable};
use snafu::{Backtrace, ResultExt, Snafu};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use wsdicom_core::ErrorKind;
use wsdicom_parser::dataset::read as dataset;
use wsdicom_parser::{DataSetHandler, DataSetReader, TagPath, TagPathSet};

/// Implicit VR Little Endian, the default transfer syntax. Its data sets
/// carry no value representation on the wire and cannot be parsed here.
const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
/// Explicit VR Big Endian (retired). Not parsed here.
const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not open file '{}': {}", filename.display(), source))]
    OpenFile {
        filename: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Could not read file meta information"))]
    ReadMeta {
        #[snafu(backtrace)]
        source: meta::Error,
    },
    #[snafu(display("Transfer syntax {} is not supported", uid))]
    UnsupportedTransferSyntax { uid: String, backtrace: Backtrace },
    #[snafu(display("Could not determine the data set position: {}", source))]
    Position {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Could not read the data set"))]
    ReadDataSet {
        #[snafu(backtrace)]
        source: dataset::Error,
    },
}

impl Error {
    /// The coarse category of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OpenFile { .. } | Error::Position { .. } => ErrorKind::Io,
            Error::ReadMeta { source } => source.kind(),
            Error::UnsupportedTransferSyntax { .. } => ErrorKind::UnsupportedSyntax,
            Error::ReadDataSet { source } => source.kind(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A reader instance bound to one DICOM file.
///
/// The reader owns the byte source and the set of registered tag paths.
/// [`parse`](DicomReader::parse) performs one full pass: preamble and
/// magic code check, file meta group, then the data set traversal with
/// the given handler. The source is closed when the reader is dropped.
#[derive(Debug)]
pub struct DicomReader<S> {
    source: S,
    selection: TagPathSet,
    meta: Option<FileMetaTable>,
}

impl DicomReader<BufReader<File>> {
    /// Open the file at the given path for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).context(OpenFileSnafu { filename: path })?;
        Ok(DicomReader::from_reader(BufReader::new(file)))
    }
}

impl<S> DicomReader<S>
where
    S: Read + Seek,
{
    /// Create a reader over an arbitrary byte source holding a complete
    /// DICOM file, preamble included.
    pub fn from_reader(source: S) -> Self {
        DicomReader {
            source,
            selection: TagPathSet::new(),
            meta: None,
        }
    }

    /// Register a tag path of interest. Handlers use the registered set
    /// for exact-match lookup; the walker also consults it as a prefix to
    /// decide whether defined-length sequences and items are descended
    /// into.
    pub fn register_path(&mut self, path: TagPath) {
        self.selection.add(path);
    }

    /// The file meta information read by the last [`parse`](Self::parse)
    /// call.
    pub fn meta(&self) -> Option<&FileMetaTable> {
        self.meta.as_ref()
    }

    /// Read the whole file, dispatching data set content to `handler`.
    ///
    /// The transfer syntax declared in the file meta group is checked
    /// first: data sets in Implicit VR Little Endian or Explicit VR Big
    /// Endian cannot be read and fail with an unsupported-syntax error.
    pub fn parse<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: for<'a> DataSetHandler<&'a mut S>,
    {
        meta::read_preamble(&mut self.source).context(ReadMetaSnafu)?;
        let table = FileMetaTable::from_reader(&mut self.source).context(ReadMetaSnafu)?;
        if let Some(uid) = table.transfer_syntax.as_deref() {
            if uid == IMPLICIT_VR_LITTLE_ENDIAN || uid == EXPLICIT_VR_BIG_ENDIAN {
                return UnsupportedTransferSyntaxSnafu { uid }.fail();
            }
        }
        self.meta = Some(table);

        let base_offset = self.source.stream_position().context(PositionSnafu)?;
        let mut reader = DataSetReader::new_at(&mut self.source, self.selection.clone(), base_offset);
        reader.read_dataset(handler).context(ReadDataSetSnafu)
    }
}
