/// Error types shared by the catalog, the thumbnail cache and the light table
use thiserror::Error;

/// Everything that can go wrong outside of a single frame's absorbed states
/// (thumbnails that are not decoded yet and short enumerations are not errors).
#[derive(Debug, Error)]
pub enum Error {
    /// The SQLite catalog rejected a query
    #[error("catalog database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The selection store could not apply a mutation
    #[error("selection store unavailable: {0}")]
    SelectionUnavailable(String),

    /// Reading or writing settings, thumbnails or folders failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid JSON
    #[error("malformed settings: {0}")]
    Settings(#[from] serde_json::Error),

    /// A thumbnail source could not be decoded or encoded
    #[error("thumbnail image error: {0}")]
    Image(#[from] image::ImageError),

    /// A RAW file carries no decodable embedded preview
    #[error("no embedded preview found in {0}")]
    NoPreview(String),

    /// Neither a cache nor a home directory could be determined
    #[error("no cache directory available")]
    NoCacheDir,

    /// The catalog lives in memory and has no file other workers could open
    #[error("catalog has no database file")]
    InMemoryCatalog,

    /// An image id has no row in the catalog
    #[error("image {0} is not in the catalog")]
    UnknownImage(i64),
}

pub type Result<T> = std::result::Result<T, Error>;
