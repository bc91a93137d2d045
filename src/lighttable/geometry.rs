/// Grid geometry derived from zoom, pan and viewport size
///
/// Cells are square: the height uses the same divisor as the width and
/// thumbnails are letterboxed inside. The geometry is recomputed every frame
/// and has no identity of its own.
use cgmath::{vec2, Vector2};

use crate::state::view::ViewportState;

/// Axis-aligned rectangle in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CellRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Grow by `amount` pixels on every side
    pub fn expand(&self, amount: f32) -> Self {
        Self::new(
            self.x - amount,
            self.y - amount,
            self.width + 2.0 * amount,
            self.height + 2.0 * amount,
        )
    }

    pub fn center(&self) -> Vector2<f32> {
        vec2(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Largest rectangle with the aspect ratio of `width` x `height` that fits
    /// into `fraction` of this one, centred
    pub fn fit(&self, fraction: f32, width: f32, height: f32) -> Self {
        let box_w = self.width * fraction;
        let box_h = self.height * fraction;
        let scale = if width > 0.0 && height > 0.0 {
            (box_w / width).min(box_h / height)
        } else {
            0.0
        };
        let (w, h) = if scale > 0.0 {
            (width * scale, height * scale)
        } else {
            (box_w, box_h)
        };
        let c = self.center();
        Self::new(c.x - w / 2.0, c.y - h / 2.0, w, h)
    }
}

/// Per-frame layout of the visible part of the mosaic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    /// Cell edge length in pixels
    pub cell: f32,
    /// First mosaic column under the viewport (may be negative)
    pub offset_col: i64,
    /// First mosaic row under the viewport (may be negative)
    pub offset_row: i64,
    /// Sub-cell pan in cell units, zero in single-image mode
    pub frac_x: f32,
    pub frac_y: f32,
    pub visible_rows: usize,
    pub visible_cols: usize,
    pub single: bool,
    pub pan: Vector2<f32>,
    pub viewport_width: f32,
    pub viewport_height: f32,
}

impl GridGeometry {
    /// Lay out a sanitized viewport over a mosaic `max_columns` wide
    pub fn compute(viewport: &ViewportState, max_columns: u32) -> Self {
        let single = viewport.is_single();
        let cell = viewport.cell_size();
        let cols_f = viewport.pan.x / cell;
        let rows_f = viewport.pan.y / cell;
        let offset_col = cols_f.floor() as i64;
        let offset_row = rows_f.floor() as i64;

        let (frac_x, frac_y) = if single {
            (0.0, 0.0)
        } else {
            (cols_f - offset_col as f32, rows_f - offset_row as f32)
        };

        let visible_rows = if single {
            1
        } else {
            2 + (viewport.height / cell).ceil() as usize
        };
        let visible_cols = if single {
            1
        } else {
            let remaining = i64::from(max_columns) - offset_col.max(0);
            let wanted = 1 + viewport.zoom.round() as i64;
            remaining.min(wanted).max(0) as usize
        };

        Self {
            cell,
            offset_col,
            offset_row,
            frac_x,
            frac_y,
            visible_rows,
            visible_cols,
            single,
            pan: viewport.pan,
            viewport_width: viewport.width,
            viewport_height: viewport.height,
        }
    }

    /// First mosaic column that gets enumerated; columns left of 0 do not exist
    pub fn first_col(&self) -> i64 {
        self.offset_col.max(0)
    }

    /// Height of a drawn cell; the single image gets the whole viewport
    pub fn cell_height(&self) -> f32 {
        if self.single {
            self.viewport_height
        } else {
            self.cell
        }
    }

    /// Screen rectangle of the visible cell at (`row`, `col`)
    pub fn cell_rect(&self, row: usize, col: usize) -> CellRect {
        if self.single {
            return CellRect::new(0.0, 0.0, self.viewport_width, self.cell_height());
        }
        let left_gap = -(self.offset_col.min(0) as f32);
        let x = (col as f32 - self.frac_x + left_gap) * self.cell;
        let y = (row as f32 - self.frac_y) * self.cell;
        CellRect::new(x, y, self.cell, self.cell_height())
    }
}

/// Change the zoom level while keeping the mosaic point under `pointer` fixed.
///
/// The pointer position is expressed in mosaic coordinates at the old zoom
/// and the pan is re-derived so it lands on the same pixel at the new zoom.
/// Zooming into single-image mode snaps to whole cells instead, so the image
/// under the pointer fills the view.
pub fn rezoom(viewport: &ViewportState, zoom: f32, pointer: Vector2<f32>) -> ViewportState {
    if zoom == viewport.zoom {
        return *viewport;
    }
    let old = viewport.mosaic_point(pointer);
    let cell = viewport.width / zoom;
    let pan = if zoom == 1.0 {
        vec2(old.x.floor() * cell, old.y.floor() * cell)
    } else {
        vec2(old.x * cell - pointer.x, old.y * cell - pointer.y)
    };
    ViewportState {
        zoom,
        pan,
        ..*viewport
    }
}
