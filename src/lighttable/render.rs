/// Cell renderer
///
/// Draws one cell in a fixed order: background, index label, thumbnail,
/// border, filename. A thumbnail that is not decoded yet is simply left out
/// and asked for again on the next frame.
use cgmath::{vec2, Vector2};

use crate::config::{Settings, ShadowStyle};
use crate::state::data::ImageId;

use super::collab::{MipLease, ThumbnailCache};
use super::geometry::CellRect;

/// RGBA color with float channels in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn gray(v: f32) -> Self {
        Self {
            r: v,
            g: v,
            b: v,
            a: 1.0,
        }
    }

    pub const fn black(alpha: f32) -> Self {
        Self {
            r: 0.0,
            g: 0.0,
            b: 0.0,
            a: alpha,
        }
    }
}

/// Canvas painted behind the mosaic
pub const MOSAIC_BACKGROUND: Rgba = Rgba::gray(0.2);
const BORDER: f32 = 0.1;

/// Drawing primitives the renderer needs from the toolkit
pub trait Surface {
    type Bitmap;

    fn fill_rect(&mut self, rect: CellRect, color: Rgba);
    fn stroke_rect(&mut self, rect: CellRect, width: f32, color: Rgba);
    /// Fill the area between `outer` and `inner` (even-odd)
    fn fill_ring(&mut self, outer: CellRect, inner: CellRect, color: Rgba);
    /// Text with its baseline starting at `origin`
    fn fill_text(&mut self, origin: Vector2<f32>, size: f32, text: &str, color: Rgba);
    fn draw_bitmap(&mut self, bitmap: &Self::Bitmap, dest: CellRect);
}

/// Grid cell or the single full-view image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMode {
    Grid,
    Single,
}

/// Per-cell drawing parameters for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct CellDrawSpec<'a> {
    pub rect: CellRect,
    pub image: ImageId,
    /// Enumeration position, shown as the index label
    pub position: u64,
    pub filename: &'a str,
    pub selected: bool,
    pub hovered: bool,
    pub mode: CellMode,
}

/// Visual parameters taken from the settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellStyle {
    pub grid_fraction: f32,
    pub single_fraction: f32,
    pub shadow: ShadowStyle,
    pub ring_width: f32,
}

impl From<&Settings> for CellStyle {
    fn from(settings: &Settings) -> Self {
        Self {
            grid_fraction: settings.grid_thumb_fraction,
            single_fraction: settings.single_thumb_fraction,
            shadow: settings.shadow,
            ring_width: settings.selection_ring_px,
        }
    }
}

impl Default for CellStyle {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// Background and text shades: default, selected, hovered
fn tones(selected: bool, hovered: bool) -> (f32, f32) {
    if hovered {
        (0.8, 0.7)
    } else if selected {
        (0.6, 0.5)
    } else {
        (0.4, 0.5)
    }
}

/// Background of a cell the enumeration left empty
pub fn draw_empty_cell<S: Surface + ?Sized>(surface: &mut S, rect: CellRect) {
    let (bg, _) = tones(false, false);
    surface.fill_rect(inset(rect), Rgba::gray(bg));
}

fn inset(rect: CellRect) -> CellRect {
    CellRect::new(
        rect.x + 0.01 * rect.width,
        rect.y + 0.01 * rect.height,
        0.99 * rect.width,
        0.99 * rect.height,
    )
}

pub fn draw_cell<S, C>(surface: &mut S, cache: &C, spec: &CellDrawSpec<'_>, style: &CellStyle)
where
    S: Surface + ?Sized,
    C: ThumbnailCache<Bitmap = S::Bitmap> + ?Sized,
{
    let rect = spec.rect;
    let (bg, font) = tones(spec.selected, spec.hovered);

    surface.fill_rect(inset(rect), Rgba::gray(bg));

    let fraction = match spec.mode {
        CellMode::Grid => {
            surface.fill_text(
                vec2(rect.x, rect.y + 0.24 * rect.height),
                0.3 * rect.width,
                &spec.position.to_string(),
                Rgba::gray(font),
            );
            style.grid_fraction
        }
        CellMode::Single => style.single_fraction,
    };

    let target_w = (rect.width * fraction).max(1.0) as u32;
    let target_h = (rect.height * fraction).max(1.0) as u32;
    let image_rect = match MipLease::acquire(cache, spec.image, target_w, target_h) {
        Some(lease) => {
            let mip = lease.mip();
            let dest = rect.fit(fraction, mip.width as f32, mip.height as f32);
            surface.draw_bitmap(&mip.bitmap, dest);
            dest
        }
        None => rect.fit(fraction, 0.0, 0.0),
    };

    match (spec.selected, spec.mode) {
        (false, _) => surface.stroke_rect(image_rect, 1.0, Rgba::gray(BORDER)),
        (true, CellMode::Single) => {
            surface.stroke_rect(image_rect, 1.0, Rgba::gray(0.2));
            draw_shadow(surface, image_rect, &style.shadow);
        }
        (true, CellMode::Grid) => {
            let outer = image_rect.expand(style.ring_width);
            surface.fill_ring(outer, image_rect, Rgba::gray(1.0 - BORDER));
            surface.stroke_rect(outer, 1.0, Rgba::gray(BORDER));
        }
    }

    if spec.selected && spec.mode == CellMode::Single {
        surface.fill_text(
            vec2(rect.x, rect.y + 0.024 * rect.height),
            0.02 * rect.width,
            spec.filename,
            Rgba::gray(font),
        );
    }
}

/// Soft highlight: rings one pixel wider each, alpha falling off outward
pub fn draw_shadow<S: Surface + ?Sized>(surface: &mut S, rect: CellRect, shadow: &ShadowStyle) {
    let mut alpha = 1.0;
    for k in 0..shadow.layers {
        surface.fill_ring(rect.expand((k + 1) as f32), rect, Rgba::black(alpha));
        alpha *= shadow.decay;
    }
}
