use image::{imageops::FilterType, DynamicImage, ImageFormat, RgbaImage};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::state::data::ImageId;

/// Edge lengths of the pre-scaled bitmaps kept per image
pub const MIP_LEVELS: [u32; 2] = [256, 1024];

/// Extensions that are decoded through their embedded JPEG preview
const RAW_EXTENSIONS: &[&str] = &[
    "nef", "dng", "cr2", "cr3", "arw", "raf", "orf", "rw2", "pef", "srw", "erf", "kdc", "dcr",
    "mos", "raw", "rwl",
];

/// Embedded JPEG search passes: bytes read from the head of the file and the
/// smallest preview accepted
const PREVIEW_TIERS: [(usize, usize); 3] = [
    (256 * 1024, 50_000),
    (512 * 1024, 30_000),
    (5 * 1024 * 1024, 10_000),
];

/// Smallest mip level whose edge covers a `width` x `height` box, or the
/// largest level when none does
pub fn level_for(width: u32, height: u32) -> u32 {
    let needed = width.max(height);
    MIP_LEVELS
        .iter()
        .copied()
        .find(|&edge| edge >= needed)
        .unwrap_or(MIP_LEVELS[MIP_LEVELS.len() - 1])
}

/// Get the thumbnail cache directory
/// Returns ~/.cache/lighttable/thumbnails on Linux
pub fn thumbnail_cache_dir() -> Result<PathBuf> {
    let mut path = dirs_next::cache_dir()
        .or_else(dirs_next::home_dir)
        .ok_or(Error::NoCacheDir)?;
    path.push("lighttable");
    path.push("thumbnails");
    Ok(path)
}

pub fn is_raw(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| RAW_EXTENSIONS.contains(&ext.as_str()))
}

/// A scaled bitmap together with where it is stored on disk
#[derive(Debug)]
pub struct Thumbnail {
    pub image: RgbaImage,
    pub path: PathBuf,
    /// False when the bitmap came from an earlier run's file
    pub generated: bool,
}

/// Produces and stores per-level thumbnails in a cache directory
#[derive(Debug, Clone)]
pub struct ThumbnailGenerator {
    dir: PathBuf,
}

impl ThumbnailGenerator {
    /// Generator writing into `dir`, created if needed
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the `edge` level of image `id`
    pub fn thumbnail_path(&self, id: ImageId, edge: u32) -> PathBuf {
        self.dir.join(format!("{}_{}.jpg", id, edge))
    }

    /// Load the cached thumbnail of `id`, generating it from `source` first
    /// if there is none
    pub fn load_or_generate(&self, id: ImageId, source: &Path, edge: u32) -> Result<Thumbnail> {
        let path = self.thumbnail_path(id, edge);
        if path.exists() {
            match image::open(&path) {
                Ok(img) => {
                    return Ok(Thumbnail {
                        image: img.to_rgba8(),
                        path,
                        generated: false,
                    })
                }
                Err(e) => log::warn!("Discarding unreadable thumbnail {}: {}", path.display(), e),
            }
        }

        let full = decode_source(source)?;
        let scaled = if full.width() > edge || full.height() > edge {
            full.resize(edge, edge, FilterType::Lanczos3)
        } else {
            full
        };
        DynamicImage::ImageRgb8(scaled.to_rgb8()).save_with_format(&path, ImageFormat::Jpeg)?;
        log::debug!("📸 Generated thumbnail: {}", path.display());

        Ok(Thumbnail {
            image: scaled.to_rgba8(),
            path,
            generated: true,
        })
    }
}

/// Decode a source file: RAW files through their embedded preview, anything
/// else through the image crate
fn decode_source(source: &Path) -> Result<DynamicImage> {
    if is_raw(source) {
        decode_embedded_preview(source)
    } else {
        Ok(image::open(source)?)
    }
}

fn decode_embedded_preview(raw_path: &Path) -> Result<DynamicImage> {
    for (max_bytes, min_size) in PREVIEW_TIERS {
        if let Some(jpeg) = extract_jpeg_from_raw(raw_path, max_bytes, min_size)? {
            if let Ok(img) = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg) {
                return Ok(img);
            }
        }
    }

    // last resort: every embedded JPEG in the whole file, largest first
    let data = fs::read(raw_path)?;
    let mut candidates = all_jpegs(&data);
    candidates.sort_by(|a, b| b.len().cmp(&a.len()));
    for jpeg in candidates {
        if let Ok(img) = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg) {
            log::debug!("🔥 Full scan: found {}KB JPEG in {}", jpeg.len() / 1024, raw_path.display());
            return Ok(img);
        }
    }
    Err(Error::NoPreview(raw_path.display().to_string()))
}

fn extract_jpeg_from_raw(raw_path: &Path, max_bytes: usize, min_size: usize) -> Result<Option<Vec<u8>>> {
    let mut data = Vec::with_capacity(max_bytes);
    fs::File::open(raw_path)?
        .take(max_bytes as u64)
        .read_to_end(&mut data)?;
    Ok(extract_jpeg_from_data(&data, min_size))
}

const JPEG_START: [u8; 2] = [0xFF, 0xD8];
const JPEG_END: [u8; 2] = [0xFF, 0xD9];

/// First embedded JPEG larger than `min_size` among the first few start markers
fn extract_jpeg_from_data(data: &[u8], min_size: usize) -> Option<Vec<u8>> {
    let starts = data
        .windows(2)
        .enumerate()
        .filter(|(_, w)| *w == JPEG_START)
        .map(|(i, _)| i)
        .take(6);

    for start in starts {
        if let Some(jpeg) = jpeg_at(data, start) {
            if jpeg.len() > min_size {
                return Some(jpeg.to_vec());
            }
        }
    }
    None
}

fn all_jpegs(data: &[u8]) -> Vec<&[u8]> {
    data.windows(2)
        .enumerate()
        .filter(|(_, w)| *w == JPEG_START)
        .filter_map(|(i, _)| jpeg_at(data, i))
        .collect()
}

/// Bytes from the start marker at `start` through the next end marker
fn jpeg_at(data: &[u8], start: usize) -> Option<&[u8]> {
    let end_offset = data[start..].windows(2).position(|w| w == JPEG_END)?;
    Some(&data[start..start + end_offset + 2])
}
