/// Thumbnail generation and the in-memory bitmap cache the light table draws from
pub mod mip_cache;
pub mod thumbnail;

pub use mip_cache::{catalog_loader, MipCache, MipLoader};
pub use thumbnail::{thumbnail_cache_dir, ThumbnailGenerator};
