//! The DICOMDIR index driver: extraction of the referenced file
//! identifiers naming the component instances of a multi-file study.

use crate::file::{self, DicomReader};
use snafu::{Backtrace, OptionExt, ResultExt, Snafu};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use wsdicom_core::{DataElementHeader, ErrorKind, Tag};
use wsdicom_parser::{DataSetHandler, HandlerError, TagPath, ValueSource};

/// Directory Record Sequence > Referenced File ID
const REFERENCED_FILE_ID_PATH: [Tag; 2] = [Tag(0x0004, 0x1220), Tag(0x0004, 0x1500)];

/// Referenced file identifiers are short path fragments; anything longer
/// than this is malformed.
const MAX_FILE_ID_LEN: u32 = 128;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("DICOMDIR path '{}' has no parent directory", path.display()))]
    NoParentDirectory { path: PathBuf, backtrace: Backtrace },
    #[snafu(display("Could not read DICOMDIR"))]
    ReadFile {
        #[snafu(backtrace)]
        source: file::Error,
    },
}

impl Error {
    /// The coarse category of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoParentDirectory { .. } => ErrorKind::Io,
            Error::ReadFile { source } => source.kind(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error raised inside the handler when a referenced file identifier
/// exceeds the supported length.
#[derive(Debug, Snafu)]
#[snafu(display(
    "Referenced file identifier of {} bytes exceeds the {} byte limit",
    len,
    MAX_FILE_ID_LEN
))]
struct FileIdTooLong {
    len: u32,
    backtrace: Backtrace,
}

/// Collects referenced file identifiers, converted from the DICOM path
/// notation (backslash-separated, space-padded) to relative paths.
#[derive(Debug)]
struct IndexCollector {
    target: TagPath,
    file_ids: Vec<String>,
}

impl<S> DataSetHandler<S> for IndexCollector
where
    S: Read + Seek,
{
    fn attribute(
        &mut self,
        path: &TagPath,
        _header: &DataElementHeader,
        value: Option<&mut ValueSource<'_, S>>,
    ) -> std::result::Result<(), HandlerError> {
        if *path != self.target {
            return Ok(());
        }
        let value = match value {
            Some(value) => value,
            None => return Ok(()),
        };
        if value.size() > MAX_FILE_ID_LEN {
            return Err(FileIdTooLongSnafu { len: value.size() }.build().into());
        }
        let mut buf = vec![0u8; value.size() as usize];
        value.read_exact(&mut buf)?;

        let text = String::from_utf8_lossy(&buf);
        let text = text.trim_end_matches(&['\0', ' '][..]);
        if text.is_empty() {
            return Ok(());
        }
        self.file_ids.push(text.replace('\\', "/"));
        Ok(())
    }
}

/// Read a `DICOMDIR` index file and return the paths of the instances it
/// references, resolved against the index's own directory.
pub fn read_index<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let directory = path
        .parent()
        .context(NoParentDirectorySnafu { path })?
        .to_path_buf();

    let mut reader = DicomReader::open(path).context(ReadFileSnafu)?;
    let target = TagPath::from(&REFERENCED_FILE_ID_PATH[..]);
    reader.register_path(target.clone());

    let mut collector = IndexCollector {
        target,
        file_ids: Vec::new(),
    };
    reader.parse(&mut collector).context(ReadFileSnafu)?;

    tracing::debug!(
        count = collector.file_ids.len(),
        "collected referenced file identifiers"
    );
    Ok(collector
        .file_ids
        .iter()
        .map(|id| directory.join(id))
        .collect())
}
