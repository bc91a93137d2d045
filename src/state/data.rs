/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the catalog layer and the light table.

use std::fmt;

/// Catalog id of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub i64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog id of a film roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RollId(pub i64);

/// An image as seen by the light table: its id plus where it sits
/// in the roll's filename-ordered enumeration
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub id: ImageId,
    /// Zero-based position within the roll, ordered by filename
    pub position: u64,
    /// Filename only (e.g., "DSC_0001.NEF")
    pub filename: String,
}

/// An ordered collection of images imported from one folder
#[derive(Debug, Clone, PartialEq)]
pub struct FilmRoll {
    pub id: RollId,
    /// Folder the roll was imported from
    pub folder: String,
    /// Number of images in the roll
    pub image_count: u64,
}

/// Result of a folder import operation
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub roll: RollId,
    pub imported_count: usize,
    pub skipped_count: usize,
}
