//! The WSMIS level driver: per-instance metadata and the tile table of a
//! VL Whole Slide Microscopy Image Storage instance.

use crate::file::{self, DicomReader};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::io::{Read, Seek};
use std::path::Path;
use wsdicom_core::{DataElementHeader, ErrorKind, Tag};
use wsdicom_encoding::decode::basic::LittleEndianBasicDecoder;
use wsdicom_parser::{DataSetHandler, HandlerError, TagPath, TagPathSet, ValueSource};

const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
const ROWS: Tag = Tag(0x0028, 0x0010);
const COLUMNS: Tag = Tag(0x0028, 0x0011);
const TOTAL_PIXEL_MATRIX_COLUMNS: Tag = Tag(0x0048, 0x0006);
const TOTAL_PIXEL_MATRIX_ROWS: Tag = Tag(0x0048, 0x0007);
const OPTICAL_PATH_SEQUENCE: Tag = Tag(0x0048, 0x0105);
const LENSES_CODE_SEQUENCE: Tag = Tag(0x0022, 0x0019);
const CODE_VALUE: Tag = Tag(0x0008, 0x0100);

/// The code value identifying a slide overview lens, which flags the
/// level as an icon/overview image.
const OVERVIEW_LENS_CODE: &str = "A-00118";

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read instance"))]
    ReadFile {
        #[snafu(backtrace)]
        source: file::Error,
    },
    #[snafu(display("Missing {} attribute", name))]
    MissingAttribute {
        name: &'static str,
        backtrace: Backtrace,
    },
    #[snafu(display("Degenerate tile geometry {}x{}", tile_w, tile_h))]
    DegenerateTileSize {
        tile_w: u32,
        tile_h: u32,
        backtrace: Backtrace,
    },
    #[snafu(display(
        "Tile grid of {}x{} does not account for {} frames",
        tiles_across,
        tiles_down,
        frames
    ))]
    TileGridMismatch {
        tiles_across: u32,
        tiles_down: u32,
        frames: u32,
        backtrace: Backtrace,
    },
    #[snafu(display("Pixel data carries {} fragments for {} frames", fragments, frames))]
    FragmentCountMismatch {
        fragments: usize,
        frames: u32,
        backtrace: Backtrace,
    },
}

impl Error {
    /// The coarse category of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ReadFile { source } => source.kind(),
            Error::MissingAttribute { .. }
            | Error::DegenerateTileSize { .. }
            | Error::TileGridMismatch { .. }
            | Error::FragmentCountMismatch { .. } => ErrorKind::StructuralViolation,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised inside the level handler while interpreting a value.
#[derive(Debug, Snafu)]
enum ValueError {
    #[snafu(display("Could not read {} value: {}", name, source))]
    ReadValue {
        name: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("Invalid {} value {:?}", name, text))]
    MalformedValue { name: &'static str, text: String },
}

/// The position of one tile's compressed data within the instance file.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TileEntry {
    /// Absolute byte offset of the fragment data.
    pub offset: u64,
    /// Fragment length in bytes.
    pub length: u32,
}

/// One pyramid level of a whole-slide image, as described by a single
/// WSMIS instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    /// Total pixel matrix width.
    pub image_w: u32,
    /// Total pixel matrix height.
    pub image_h: u32,
    /// Tile width.
    pub tile_w: u32,
    /// Tile height.
    pub tile_h: u32,
    /// Number of frames (tiles).
    pub frames: u32,
    /// The instance's content fingerprint: the Study Instance UID, or the
    /// SOP Instance UID from the file meta group when the data set does
    /// not carry one.
    pub fingerprint: Option<String>,
    /// Whether the optical path identifies this level as a slide
    /// overview/icon image.
    pub is_overview: bool,
    /// Per-frame tile table, in frame order.
    pub tiles: Vec<TileEntry>,
}

impl Level {
    /// The number of tile columns covering the pixel matrix.
    pub fn tiles_across(&self) -> u32 {
        (self.image_w + self.tile_w - 1) / self.tile_w
    }

    /// The number of tile rows covering the pixel matrix.
    pub fn tiles_down(&self) -> u32 {
        (self.image_h + self.tile_h - 1) / self.tile_h
    }
}

/// Collects the registered level attributes and the pixel fragment table.
#[derive(Debug, Default)]
struct LevelCollector {
    selection: TagPathSet,
    rows: Option<u16>,
    columns: Option<u16>,
    matrix_columns: Option<u32>,
    matrix_rows: Option<u32>,
    frames: Option<u32>,
    study_uid: Option<String>,
    overview: bool,
    tiles: Vec<TileEntry>,
}

impl LevelCollector {
    fn read_us(value: &mut impl Read, name: &'static str) -> std::result::Result<u16, ValueError> {
        LittleEndianBasicDecoder
            .decode_us(value)
            .context(ReadValueSnafu { name })
    }

    fn read_ul(value: &mut impl Read, name: &'static str) -> std::result::Result<u32, ValueError> {
        LittleEndianBasicDecoder
            .decode_ul(value)
            .context(ReadValueSnafu { name })
    }

    fn read_text(
        value: &mut impl Read,
        name: &'static str,
    ) -> std::result::Result<String, ValueError> {
        let mut buf = Vec::new();
        value.read_to_end(&mut buf).context(ReadValueSnafu { name })?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl<S> DataSetHandler<S> for LevelCollector
where
    S: Read + Seek,
{
    fn attribute(
        &mut self,
        path: &TagPath,
        header: &DataElementHeader,
        value: Option<&mut ValueSource<'_, S>>,
    ) -> std::result::Result<(), HandlerError> {
        if !self.selection.find(path) {
            return Ok(());
        }
        let value = match value {
            Some(value) => value,
            None => return Ok(()),
        };
        match header.tag {
            ROWS => self.rows = Some(Self::read_us(value, "Rows")?),
            COLUMNS => self.columns = Some(Self::read_us(value, "Columns")?),
            TOTAL_PIXEL_MATRIX_COLUMNS => {
                self.matrix_columns = Some(Self::read_ul(value, "TotalPixelMatrixColumns")?);
            }
            TOTAL_PIXEL_MATRIX_ROWS => {
                self.matrix_rows = Some(Self::read_ul(value, "TotalPixelMatrixRows")?);
            }
            NUMBER_OF_FRAMES => {
                let name = "NumberOfFrames";
                let text = Self::read_text(value, name)?;
                let frames = text
                    .trim_matches(&['\0', ' '][..])
                    .parse()
                    .ok()
                    .context(MalformedValueSnafu { name, text: &text })?;
                self.frames = Some(frames);
            }
            STUDY_INSTANCE_UID => {
                let text = Self::read_text(value, "StudyInstanceUID")?;
                self.study_uid = Some(text.trim_end_matches(&['\0', ' '][..]).to_string());
            }
            CODE_VALUE => {
                let text = Self::read_text(value, "CodeValue")?;
                if text.trim_end_matches(&['\0', ' '][..]) == OVERVIEW_LENS_CODE {
                    self.overview = true;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn pixel_fragment(
        &mut self,
        _path: &TagPath,
        offset: u64,
        length: u32,
    ) -> std::result::Result<(), HandlerError> {
        self.tiles.push(TileEntry { offset, length });
        Ok(())
    }
}

/// Read one WSMIS instance and return its level description.
pub fn read_level<P: AsRef<Path>>(path: P) -> Result<Level> {
    let mut reader = DicomReader::open(path).context(ReadFileSnafu)?;
    let mut selection = TagPathSet::new();
    for path in [
        TagPath::from([STUDY_INSTANCE_UID]),
        TagPath::from([NUMBER_OF_FRAMES]),
        TagPath::from([ROWS]),
        TagPath::from([COLUMNS]),
        TagPath::from([TOTAL_PIXEL_MATRIX_COLUMNS]),
        TagPath::from([TOTAL_PIXEL_MATRIX_ROWS]),
        TagPath::from([OPTICAL_PATH_SEQUENCE, LENSES_CODE_SEQUENCE, CODE_VALUE]),
    ] {
        reader.register_path(path.clone());
        selection.add(path);
    }

    let mut collector = LevelCollector {
        selection,
        ..LevelCollector::default()
    };
    reader.parse(&mut collector).context(ReadFileSnafu)?;

    let tile_w = u32::from(collector.columns.context(MissingAttributeSnafu { name: "Columns" })?);
    let tile_h = u32::from(collector.rows.context(MissingAttributeSnafu { name: "Rows" })?);
    let image_w = collector.matrix_columns.context(MissingAttributeSnafu {
        name: "TotalPixelMatrixColumns",
    })?;
    let image_h = collector.matrix_rows.context(MissingAttributeSnafu {
        name: "TotalPixelMatrixRows",
    })?;
    let frames = collector.frames.context(MissingAttributeSnafu {
        name: "NumberOfFrames",
    })?;
    ensure!(
        tile_w > 0 && tile_h > 0,
        DegenerateTileSizeSnafu { tile_w, tile_h }
    );

    let fingerprint = collector.study_uid.or_else(|| {
        reader
            .meta()
            .and_then(|meta| meta.media_storage_sop_instance_uid.clone())
    });

    let level = Level {
        image_w,
        image_h,
        tile_w,
        tile_h,
        frames,
        fingerprint,
        is_overview: collector.overview,
        tiles: collector.tiles,
    };

    let (tiles_across, tiles_down) = (level.tiles_across(), level.tiles_down());
    ensure!(
        tiles_across * tiles_down == frames,
        TileGridMismatchSnafu {
            tiles_across,
            tiles_down,
            frames,
        }
    );
    ensure!(
        level.tiles.len() == frames as usize,
        FragmentCountMismatchSnafu {
            fragments: level.tiles.len(),
            frames,
        }
    );

    tracing::debug!(
        image_w = level.image_w,
        image_h = level.image_h,
        tile_w = level.tile_w,
        tile_h = level.tile_h,
        frames = level.frames,
        is_overview = level.is_overview,
        "read level description"
    );
    Ok(level)
}
