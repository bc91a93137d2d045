/// Grid addressing: visible cells to linear enumeration indices and back
///
/// Row `r` of the mosaic starts at index `r * max_columns`, so the mosaic is
/// always `max_columns` wide no matter how many columns are visible.
use crate::error::Result;
use crate::state::data::{ImageRef, RollId};

use super::collab::ImageEnumerator;
use super::geometry::GridGeometry;

/// Maps between mosaic cells and enumeration indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridAddress {
    pub max_columns: u32,
}

impl GridAddress {
    pub fn new(max_columns: u32) -> Self {
        Self {
            max_columns: max_columns.max(1),
        }
    }

    /// Mosaic (row, column) holding an enumeration index
    pub fn cell_of(&self, index: u64) -> (i64, i64) {
        let width = u64::from(self.max_columns);
        ((index / width) as i64, (index % width) as i64)
    }

    /// Enumeration index of the first visible cell; negative above the mosaic
    pub fn base(&self, geometry: &GridGeometry) -> i64 {
        geometry.first_col() + i64::from(self.max_columns) * geometry.offset_row
    }

    /// One enumeration window per visible row that lies inside the mosaic.
    /// Rows above the first mosaic row are skipped but keep their slot, so
    /// `row` still tells where to draw.
    pub fn row_windows(&self, geometry: &GridGeometry) -> Vec<RowWindow> {
        let mut windows = Vec::with_capacity(geometry.visible_rows);
        let mut base = self.base(geometry);
        for row in 0..geometry.visible_rows {
            if let Ok(offset) = u64::try_from(base) {
                windows.push(RowWindow {
                    row,
                    offset,
                    limit: geometry.visible_cols,
                });
            }
            base += i64::from(self.max_columns);
        }
        windows
    }
}

/// Enumeration window of one visible row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWindow {
    /// Visible row this window is drawn in
    pub row: usize,
    pub offset: u64,
    pub limit: usize,
}

/// A visible cell; `image` is `None` when the enumeration ran short
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
    pub image: Option<ImageRef>,
}

/// Resolve every visible cell of `roll` through the enumerator
pub fn resolve_cells<E: ImageEnumerator + ?Sized>(
    enumerator: &E,
    roll: RollId,
    address: &GridAddress,
    geometry: &GridGeometry,
) -> Result<Vec<GridCell>> {
    let mut cells = Vec::new();
    if geometry.visible_cols == 0 {
        return Ok(cells);
    }
    for window in address.row_windows(geometry) {
        let mut images = enumerator
            .enumerate(roll, window.offset, window.limit)?
            .into_iter();
        for col in 0..window.limit {
            cells.push(GridCell {
                row: window.row,
                col,
                image: images.next(),
            });
        }
    }
    Ok(cells)
}
