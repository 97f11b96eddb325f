//! Tag paths: the current nesting position of the walker, and the set of
//! positions registered as interesting by the caller.

use smallvec::SmallVec;
use snafu::{Backtrace, Snafu};
use std::fmt;
use wsdicom_core::Tag;

/// The maximum supported nesting depth of a tag path. DICOM nesting depth
/// in practice is small; exceeding this limit is a hard error.
pub const MAX_DEPTH: usize = 16;

/// Error raised when pushing past the supported nesting depth.
#[derive(Debug, Snafu)]
#[snafu(display("Tag path nesting deeper than {} levels", MAX_DEPTH))]
pub struct DepthLimitExceeded {
    backtrace: Backtrace,
}

/// An ordered sequence of tags, root to leaf, naming a position inside the
/// element tree.
///
/// The path lives inline (no heap allocation) up to [`MAX_DEPTH`] entries,
/// so the walker's push and pop during descent are plain integer
/// operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPath {
    tags: SmallVec<[Tag; MAX_DEPTH]>,
}

impl TagPath {
    /// Create an empty tag path.
    pub fn new() -> Self {
        TagPath::default()
    }

    /// Append a tag to the path.
    pub fn push(&mut self, tag: Tag) -> Result<(), DepthLimitExceeded> {
        if self.tags.len() == MAX_DEPTH {
            return DepthLimitExceededSnafu.fail();
        }
        self.tags.push(tag);
        Ok(())
    }

    /// Remove and return the leaf tag.
    pub fn pop(&mut self) -> Option<Tag> {
        self.tags.pop()
    }

    /// The leaf tag, if the path is not empty.
    pub fn last(&self) -> Option<Tag> {
        self.tags.last().copied()
    }

    /// The number of tags in the path.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the path holds no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// The tags of the path, root to leaf.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Check whether this path is a prefix of (or equal to) `other`.
    pub fn is_prefix_of(&self, other: &TagPath) -> bool {
        self.tags.len() <= other.tags.len() && self.tags[..] == other.tags[..self.tags.len()]
    }
}

impl From<&[Tag]> for TagPath {
    fn from(tags: &[Tag]) -> Self {
        TagPath {
            tags: tags.iter().copied().collect(),
        }
    }
}

impl<const N: usize> From<[Tag; N]> for TagPath {
    fn from(tags: [Tag; N]) -> Self {
        TagPath {
            tags: tags.iter().copied().collect(),
        }
    }
}

impl FromIterator<Tag> for TagPath {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        TagPath {
            tags: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, tag) in self.tags.iter().enumerate() {
            if i != 0 {
                f.write_str(">")?;
            }
            write!(f, "{}", tag)?;
        }
        Ok(())
    }
}

/// An unordered collection of tag paths registered by the caller before
/// parsing.
///
/// Two matching modes are supported: [`find`](TagPathSet::find) checks for
/// an exact match and is meant for handlers deciding whether an attribute
/// is one of the requested ones; [`matches`](TagPathSet::matches) checks
/// whether a registered path and the given path agree on their common
/// prefix, and is the walker's descent decision for defined-length
/// sequences and items.
#[derive(Debug, Clone, Default)]
pub struct TagPathSet {
    paths: Vec<TagPath>,
}

impl TagPathSet {
    /// Create an empty path set.
    pub fn new() -> Self {
        TagPathSet::default()
    }

    /// Register a path.
    pub fn add(&mut self, path: TagPath) {
        self.paths.push(path);
    }

    /// The number of registered paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no path has been registered.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Check whether some registered path equals `path` exactly.
    pub fn find(&self, path: &TagPath) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Check whether some registered path shares a full common prefix with
    /// `path`: either the registered path extends `path` (there is
    /// something of interest further down) or `path` lies at or below a
    /// registered path.
    pub fn matches(&self, path: &TagPath) -> bool {
        self.paths
            .iter()
            .any(|p| path.is_prefix_of(p) || p.is_prefix_of(path))
    }
}
