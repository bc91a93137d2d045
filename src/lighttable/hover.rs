/// Which image is under the pointer
use cgmath::Vector2;

use crate::state::data::ImageId;

use super::geometry::GridGeometry;
use super::grid::GridCell;
use super::selection::CellPos;

/// Visible-grid cell under a pointer position. In single-image mode the sole
/// cell is always the one under the pointer.
pub fn pointer_cell(geometry: &GridGeometry, pointer: Vector2<f32>) -> CellPos {
    if geometry.single {
        return CellPos::new(0, 0);
    }
    let col = ((pointer.x + geometry.pan.x) / geometry.cell).floor() as i64 - geometry.first_col();
    let row = ((pointer.y + geometry.pan.y) / geometry.cell).floor() as i64 - geometry.offset_row;
    CellPos::new(row, col)
}

/// Hovered image for this frame.
///
/// While a pan gesture runs the previous hover is kept. In single-image mode
/// the shown image is hovered regardless of the pointer.
pub fn resolve_hover(
    geometry: &GridGeometry,
    cells: &[GridCell],
    pointer: Option<Vector2<f32>>,
    pan_active: bool,
    current: Option<ImageId>,
) -> Option<ImageId> {
    if geometry.single {
        let sole = cells.iter().find_map(|c| c.image.as_ref()).map(|i| i.id);
        return if pan_active { current.or(sole) } else { sole };
    }
    if pan_active {
        return current;
    }
    let target = pointer_cell(geometry, pointer?);
    cells
        .iter()
        .find(|c| c.row as i64 == target.row && c.col as i64 == target.col)
        .and_then(|c| c.image.as_ref())
        .map(|i| i.id)
}

/// Hover after the pointer left the viewport: cleared unless a pan is in
/// progress or the single image is shown
pub fn hover_after_leave(current: Option<ImageId>, pan_active: bool, single: bool) -> Option<ImageId> {
    if pan_active || single {
        current
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::ImageRef;
    use crate::state::view::ViewportState;
    use cgmath::vec2;

    fn geometry(zoom: f32, pan: (f32, f32)) -> GridGeometry {
        let vp = ViewportState {
            zoom,
            pan: vec2(pan.0, pan.1),
            width: 800.0,
            height: 600.0,
        };
        GridGeometry::compute(&vp, 13)
    }

    fn cells(rows: usize, cols: usize, filled: usize) -> Vec<GridCell> {
        (0..rows)
            .flat_map(|row| (0..cols).map(move |col| (row, col)))
            .enumerate()
            .map(|(i, (row, col))| GridCell {
                row,
                col,
                image: (i < filled).then(|| ImageRef {
                    id: ImageId(i as i64),
                    position: i as u64,
                    filename: format!("{i}.jpg"),
                }),
            })
            .collect()
    }

    #[test]
    fn test_pointer_cell_with_pan() {
        let g = geometry(4.0, (250.0, 450.0));
        assert_eq!(pointer_cell(&g, vec2(0.0, 0.0)), CellPos::new(0, 0));
        assert_eq!(pointer_cell(&g, vec2(160.0, 160.0)), CellPos::new(1, 1));
        assert_eq!(pointer_cell(&g, vec2(140.0, 140.0)), CellPos::new(0, 0));
    }

    #[test]
    fn test_pointer_cell_left_of_mosaic() {
        let g = geometry(4.0, (-250.0, 0.0));
        // the pointer sits over empty space left of column 0
        assert_eq!(pointer_cell(&g, vec2(10.0, 10.0)).col, -2);
        assert_eq!(pointer_cell(&g, vec2(260.0, 10.0)).col, 0);
    }

    #[test]
    fn test_hover_follows_pointer() {
        let g = geometry(4.0, (0.0, 0.0));
        let grid = cells(5, 5, 10);
        assert_eq!(
            resolve_hover(&g, &grid, Some(vec2(450.0, 250.0)), false, None),
            Some(ImageId(7))
        );
        assert_eq!(resolve_hover(&g, &grid, Some(vec2(450.0, 450.0)), false, None), None);
        assert_eq!(resolve_hover(&g, &grid, None, false, Some(ImageId(3))), None);
    }

    #[test]
    fn test_hover_frozen_while_panning() {
        let g = geometry(4.0, (0.0, 0.0));
        let grid = cells(5, 5, 10);
        assert_eq!(
            resolve_hover(&g, &grid, Some(vec2(450.0, 250.0)), true, Some(ImageId(1))),
            Some(ImageId(1))
        );
    }

    #[test]
    fn test_single_image_is_always_hovered() {
        let g = geometry(1.0, (0.0, 0.0));
        let grid = cells(1, 1, 1);
        assert_eq!(resolve_hover(&g, &grid, None, false, None), Some(ImageId(0)));
        assert_eq!(
            resolve_hover(&g, &grid, Some(vec2(700.0, 500.0)), false, None),
            Some(ImageId(0))
        );
        assert_eq!(resolve_hover(&g, &cells(1, 1, 0), None, false, None), None);
    }

    #[test]
    fn test_leave_clears_hover_only_when_idle_in_grid() {
        let id = Some(ImageId(4));
        assert_eq!(hover_after_leave(id, false, false), None);
        assert_eq!(hover_after_leave(id, true, false), id);
        assert_eq!(hover_after_leave(id, false, true), id);
    }
}
