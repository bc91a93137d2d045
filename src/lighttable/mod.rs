/// The light table: a zoomable, pannable mosaic of a film roll's thumbnails
///
/// Each frame runs the same pipeline:
/// - `geometry.rs` turns zoom, pan and viewport size into a grid layout
/// - `grid.rs` resolves the visible cells to images through the catalog
/// - `hover.rs` finds the image under the pointer
/// - `selection.rs` applies a pending click gesture to the resolved cells
/// - `render.rs` draws every cell
///
/// Nothing in here knows about iced, SQLite or the file system; the outside
/// world is reached through the traits in `collab.rs`.

pub mod collab;
pub mod geometry;
pub mod grid;
pub mod hover;
pub mod render;
pub mod selection;

use cgmath::{vec2, Vector2};

use crate::config::Settings;
use crate::error::Result;
use crate::state::data::RollId;
use crate::state::view::{ViewSnapshot, ViewState, ViewportState};

use collab::{ImageEnumerator, RedrawSink, SelectionStore, ThumbnailCache};
use geometry::{CellRect, GridGeometry};
use grid::{GridAddress, GridCell};
use render::{CellDrawSpec, CellMode, CellStyle, Surface, MOSAIC_BACKGROUND};
use selection::{CellPos, Modifiers, PointerButton, SelectionEngine};

pub struct LightTable {
    view: ViewState,
    selection: SelectionEngine,
    address: GridAddress,
    style: CellStyle,
    max_zoom: f32,
    roll: Option<RollId>,
    /// Zoom the previous frame was drawn with
    drawn_zoom: f32,
    /// Pan plus pointer at the moment the button went down
    drag_origin: Option<Vector2<f32>>,
}

impl LightTable {
    pub fn new(settings: &Settings) -> Self {
        let settings = settings.clone().sanitized();
        let view = ViewState::new(settings.initial_zoom);
        let drawn_zoom = view.viewport().sanitized(settings.max_zoom).zoom;
        Self {
            view,
            selection: SelectionEngine::new(),
            address: GridAddress::new(settings.max_columns),
            style: CellStyle::from(&settings),
            max_zoom: settings.max_zoom,
            roll: None,
            drawn_zoom,
            drag_origin: None,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.view.snapshot()
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    pub fn roll(&self) -> Option<RollId> {
        self.roll
    }

    /// Show another film roll from its first image
    pub fn set_roll(&mut self, roll: Option<RollId>) {
        if self.roll == roll {
            return;
        }
        log::debug!("light table switched to roll {roll:?}");
        self.roll = roll;
        self.selection.reset();
        self.view.set_hovered(None);
        self.view.set_pan(vec2(0.0, 0.0));
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.view.set_size(width, height);
    }

    /// New zoom level; the pan is re-projected around the pointer when the
    /// next frame is drawn
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.view.set_zoom(zoom.clamp(1.0, self.max_zoom));
        }
    }

    /// Step the zoom by whole levels (positive zooms out: more cells)
    pub fn zoom_by(&mut self, steps: i32) {
        let zoom = self.view.zoom().round() + steps as f32;
        self.set_zoom(zoom);
    }

    pub fn request_center(&mut self) {
        self.view.request_center();
    }

    /// Pan so the cell holding enumeration `position` is the top-left one
    pub fn scroll_to(&mut self, position: u64) {
        let (row, col) = self.address.cell_of(position);
        let cell = self.view.viewport().sanitized(self.max_zoom).cell_size();
        self.view.set_pan(vec2(col as f32 * cell, row as f32 * cell));
    }

    pub fn button_pressed<S: SelectionStore + ?Sized>(
        &mut self,
        store: &S,
        redraw: &dyn RedrawSink,
        pointer: Vector2<f32>,
        button: PointerButton,
        modifiers: Modifiers,
    ) -> Result<()> {
        self.view.set_pointer(Some(pointer));
        self.drag_origin = Some(self.view.pan() + pointer);
        self.view.set_pan_active(true);
        redraw.request_redraw();
        self.selection.begin_gesture(store, modifiers, button)
    }

    pub fn button_released(&mut self, redraw: &dyn RedrawSink) {
        self.view.set_pan_active(false);
        self.drag_origin = None;
        self.selection.end_gesture();
        redraw.request_redraw();
    }

    pub fn mouse_moved(&mut self, redraw: &dyn RedrawSink, pointer: Vector2<f32>) {
        self.view.set_pointer(Some(pointer));
        redraw.request_redraw();
    }

    pub fn mouse_left(&mut self, redraw: &dyn RedrawSink) {
        self.view.set_pointer(None);
        let hovered = hover::hover_after_leave(
            self.view.hovered(),
            self.view.pan_active(),
            self.view.viewport().is_single(),
        );
        if hovered != self.view.hovered() {
            self.view.set_hovered(hovered);
            redraw.request_redraw();
        }
    }

    /// Empty the selection and forget the anchor
    pub fn clear_selection<S: SelectionStore + ?Sized>(&mut self, store: &S, redraw: &dyn RedrawSink) -> Result<()> {
        self.selection.reset();
        self.selection.clear_all(store)?;
        redraw.request_redraw();
        Ok(())
    }

    /// Toggle the hovered image, falling back to the anchor's image
    pub fn toggle_hovered<S: SelectionStore + ?Sized>(&mut self, store: &S, redraw: &dyn RedrawSink) -> Result<()> {
        let target = self
            .view
            .hovered()
            .or_else(|| self.selection.anchor().map(|a| a.image));
        if let Some(image) = target {
            self.selection.toggle(store, image)?;
            redraw.request_redraw();
        }
        Ok(())
    }

    /// Apply pending view changes (drag, zoom, center) and lay out the grid
    fn update_viewport(&mut self) -> GridGeometry {
        let mut viewport = self.view.viewport().sanitized(self.max_zoom);
        let pointer = self.view.pointer();

        if let (true, Some(origin), Some(p)) = (self.view.pan_active(), self.drag_origin, pointer) {
            viewport.pan = origin - p;
        }

        if self.drawn_zoom != viewport.zoom {
            let anchor = pointer.unwrap_or(vec2(viewport.width / 2.0, viewport.height / 2.0));
            let before = ViewportState {
                zoom: self.drawn_zoom,
                ..viewport
            };
            viewport = geometry::rezoom(&before, viewport.zoom, anchor);
        }

        if self.view.take_center_request() {
            match (self.view.hovered(), pointer) {
                (Some(_), Some(p)) => {
                    viewport.pan.x -= viewport.width / 2.0 - p.x;
                    viewport.pan.y -= viewport.height / 2.0 - p.y;
                }
                _ => viewport.pan = vec2(0.0, 0.0),
            }
        }

        self.view.set_viewport(viewport);
        self.drawn_zoom = viewport.zoom;
        GridGeometry::compute(&viewport, self.address.max_columns)
    }

    /// Draw one frame. Click gestures are applied here, on the first frame
    /// after the button went down. A failed selection mutation stops the
    /// click but the frame is still drawn; the error is returned afterwards.
    pub fn expose<E, S, C, F>(&mut self, enumerator: &E, store: &S, cache: &C, surface: &mut F) -> Result<()>
    where
        E: ImageEnumerator + ?Sized,
        S: SelectionStore + ?Sized,
        C: ThumbnailCache<Bitmap = F::Bitmap> + ?Sized,
        F: Surface + ?Sized,
    {
        let geometry = self.update_viewport();
        surface.fill_rect(
            CellRect::new(0.0, 0.0, geometry.viewport_width, geometry.viewport_height),
            MOSAIC_BACKGROUND,
        );

        let cells = match self.roll {
            Some(roll) => grid::resolve_cells(enumerator, roll, &self.address, &geometry)?,
            None => Vec::new(),
        };

        let pointer = self.view.pointer();
        let hovered = hover::resolve_hover(
            &geometry,
            &cells,
            pointer,
            self.view.pan_active(),
            self.view.hovered(),
        );
        self.view.set_hovered(hovered);

        let mut failure = None;
        if self.selection.has_pending_click() {
            if let Err(err) = self.apply_click(store, &geometry, &cells, pointer) {
                log::warn!("selection update failed: {err}");
                failure = Some(err);
            }
        }

        let selected = match self.selection.snapshot(store) {
            Ok(selected) => selected,
            Err(err) => {
                log::warn!("could not read the selection: {err}");
                failure.get_or_insert(err);
                Default::default()
            }
        };

        let mode = if geometry.single { CellMode::Single } else { CellMode::Grid };
        for cell in &cells {
            let rect = geometry.cell_rect(cell.row, cell.col);
            match &cell.image {
                Some(image) => {
                    let spec = CellDrawSpec {
                        rect,
                        image: image.id,
                        position: image.position,
                        filename: &image.filename,
                        selected: selected.is_selected(image.id),
                        hovered: hovered == Some(image.id),
                        mode,
                    };
                    render::draw_cell(surface, cache, &spec, &self.style);
                }
                None => render::draw_empty_cell(surface, rect),
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply_click<S: SelectionStore + ?Sized>(
        &mut self,
        store: &S,
        geometry: &GridGeometry,
        cells: &[GridCell],
        pointer: Option<Vector2<f32>>,
    ) -> Result<()> {
        let resolved = cells.iter().filter_map(|c| {
            c.image
                .as_ref()
                .map(|i| (i.id, CellPos::new(c.row as i64, c.col as i64)))
        });
        let target = pointer.map(|p| hover::pointer_cell(geometry, p));
        self.selection.prepare_click(target, !geometry.single, resolved.clone());

        let result = resolved
            .map(|(image, cell)| self.selection.apply_click(store, image, cell))
            .find(|r| r.is_err())
            .unwrap_or(Ok(false));
        self.selection.finish_click();
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighttable::grid::tests::FakeRoll;
    use crate::lighttable::render::tests::{Op, RecordingSurface, ScriptedCache};
    use crate::lighttable::selection::tests::MemoryStore;
    use crate::state::data::ImageId;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingRedraw(Cell<usize>);

    impl RedrawSink for CountingRedraw {
        fn request_redraw(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    struct Fixture {
        table: LightTable,
        roll: FakeRoll,
        store: MemoryStore,
        cache: ScriptedCache,
        redraw: CountingRedraw,
    }

    impl Fixture {
        /// 800x600 view at zoom 4 over a 5-column mosaic
        fn new(images: u64) -> Self {
            let settings = Settings {
                max_columns: 5,
                initial_zoom: 4.0,
                ..Settings::default()
            };
            let mut table = LightTable::new(&settings);
            table.resize(800.0, 600.0);
            table.set_roll(Some(RollId(1)));
            Self {
                table,
                roll: FakeRoll::new(images),
                store: MemoryStore::default(),
                cache: ScriptedCache::default(),
                redraw: CountingRedraw::default(),
            }
        }

        fn frame(&mut self) -> Result<RecordingSurface> {
            let mut surface = RecordingSurface::default();
            self.table
                .expose(&self.roll, &self.store, &self.cache, &mut surface)?;
            Ok(surface)
        }

        /// Press, draw the click frame, release
        fn click(&mut self, x: f32, y: f32, modifiers: Modifiers) -> Result<()> {
            self.table.mouse_moved(&self.redraw, vec2(x, y));
            self.table.button_pressed(
                &self.store,
                &self.redraw,
                vec2(x, y),
                PointerButton::Primary,
                modifiers,
            )?;
            let result = self.frame().map(|_| ());
            self.table.button_released(&self.redraw);
            result
        }

        fn selected(&self) -> Vec<i64> {
            let mut ids: Vec<_> = self.store.set.borrow().iter().map(|id| id.0).collect();
            ids.sort();
            ids
        }
    }

    /// Image id of the mosaic cell (row, col) in a 5-column mosaic
    fn id(row: u64, col: u64) -> i64 {
        FakeRoll::id_at(row * 5 + col).0
    }

    #[test]
    fn test_ten_images_layout() {
        let mut fx = Fixture::new(10);
        let surface = fx.frame().unwrap();

        let labels: Vec<_> = surface
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(labels, (0..10).map(|i| i.to_string()).collect::<Vec<_>>());
        assert_eq!(*fx.roll.calls.borrow(), vec![(0, 5), (5, 5), (10, 5), (15, 5), (20, 5)]);
    }

    #[test]
    fn test_plain_click_selects_exactly_one() {
        let mut fx = Fixture::new(10);
        fx.store.set.borrow_mut().insert(ImageId(999));

        fx.click(450.0, 250.0, Modifiers::NONE).unwrap();

        assert_eq!(fx.selected(), vec![id(1, 2)]);
    }

    #[test]
    fn test_plain_click_on_empty_cell_clears() {
        let mut fx = Fixture::new(10);
        fx.click(50.0, 50.0, Modifiers::NONE).unwrap();

        fx.click(450.0, 450.0, Modifiers::NONE).unwrap();
        assert!(fx.selected().is_empty());
    }

    #[test]
    fn test_modified_click_on_empty_cell_changes_nothing() {
        let mut fx = Fixture::new(10);
        fx.click(50.0, 50.0, Modifiers::NONE).unwrap();
        let toggles = fx.store.toggles.get();

        fx.click(450.0, 450.0, Modifiers::CTRL).unwrap();

        assert_eq!(fx.store.toggles.get(), toggles);
        assert_eq!(fx.selected(), vec![id(0, 0)]);
    }

    #[test]
    fn test_shift_click_selects_rectangle_of_resolved_cells() {
        let mut fx = Fixture::new(8);
        fx.click(250.0, 50.0, Modifiers::NONE).unwrap();
        fx.click(750.0, 250.0, Modifiers::SHIFT).unwrap();

        // rows 0-1, columns 1-3; (1, 3) is position 8 which does not exist
        assert_eq!(
            fx.selected(),
            vec![id(0, 1), id(0, 2), id(0, 3), id(1, 1), id(1, 2)]
        );
    }

    #[test]
    fn test_selection_failure_is_reported_and_frame_drawn() {
        let mut fx = Fixture::new(10);
        fx.click(50.0, 50.0, Modifiers::NONE).unwrap();
        fx.store.fail.set(true);

        fx.table.mouse_moved(&fx.redraw, vec2(250.0, 50.0));
        fx.table
            .button_pressed(&fx.store, &fx.redraw, vec2(250.0, 50.0), PointerButton::Primary, Modifiers::CTRL)
            .unwrap();
        let mut surface = RecordingSurface::default();
        let result = fx.table.expose(&fx.roll, &fx.store, &fx.cache, &mut surface);

        assert!(result.is_err());
        assert!(surface.ops.iter().any(|op| matches!(op, Op::Text(t) if t == "9")));
        assert_eq!(fx.selected(), vec![id(0, 0)]);
        assert!(!fx.table.selection().has_pending_click());
    }

    #[test]
    fn test_failed_clear_drops_the_click() {
        let mut fx = Fixture::new(10);
        fx.store.set.borrow_mut().insert(ImageId(999));
        fx.store.fail.set(true);

        fx.table.mouse_moved(&fx.redraw, vec2(450.0, 250.0));
        let pressed = fx.table.button_pressed(
            &fx.store,
            &fx.redraw,
            vec2(450.0, 250.0),
            PointerButton::Primary,
            Modifiers::NONE,
        );
        assert!(pressed.is_err());
        assert!(!fx.table.selection().has_pending_click());

        fx.store.fail.set(false);
        fx.frame().unwrap();
        fx.table.button_released(&fx.redraw);

        assert_eq!(fx.selected(), vec![999]);
    }

    #[test]
    fn test_out_of_range_zoom_settings() {
        let settings = Settings {
            max_zoom: 0.5,
            initial_zoom: f32::NAN,
            ..Settings::default()
        };
        let mut table = LightTable::new(&settings);
        let max_zoom = Settings::default().max_zoom;

        table.set_zoom(40.0);
        assert_eq!(table.view().zoom(), max_zoom);
        table.set_zoom(f32::NAN);
        assert_eq!(table.view().zoom(), max_zoom);
        table.set_zoom(0.0);
        assert_eq!(table.view().zoom(), 1.0);

        let nan_max = Settings {
            max_zoom: f32::NAN,
            ..Settings::default()
        };
        let mut table = LightTable::new(&nan_max);
        table.zoom_by(100);
        assert_eq!(table.view().zoom(), max_zoom);
    }

    #[test]
    fn test_single_image_mode() {
        let mut fx = Fixture::new(10);
        fx.table.set_zoom(1.0);
        fx.table.mouse_moved(&fx.redraw, vec2(450.0, 250.0));
        fx.frame().unwrap();

        // zoomed into the image under the pointer: mosaic cell (1, 2)
        assert_eq!(fx.table.view().hovered(), Some(ImageId(id(1, 2))));
        assert_eq!(fx.roll.calls.borrow().last(), Some(&(7, 1)));

        fx.table.mouse_left(&fx.redraw);
        assert_eq!(fx.table.view().hovered(), Some(ImageId(id(1, 2))));
    }

    #[test]
    fn test_single_mode_shift_click_toggles_only_shown_image() {
        let mut fx = Fixture::new(10);
        fx.click(50.0, 50.0, Modifiers::NONE).unwrap();
        fx.table.set_zoom(1.0);
        fx.table.mouse_moved(&fx.redraw, vec2(450.0, 250.0));
        fx.frame().unwrap();

        fx.click(700.0, 500.0, Modifiers::SHIFT).unwrap();
        assert_eq!(fx.selected(), vec![id(0, 0), id(1, 2)]);
    }

    #[test]
    fn test_hover_cleared_when_pointer_leaves_grid() {
        let mut fx = Fixture::new(10);
        fx.table.mouse_moved(&fx.redraw, vec2(50.0, 50.0));
        fx.frame().unwrap();
        assert_eq!(fx.table.view().hovered(), Some(ImageId(id(0, 0))));

        let before = fx.redraw.0.get();
        fx.table.mouse_left(&fx.redraw);
        assert_eq!(fx.table.view().hovered(), None);
        assert_eq!(fx.redraw.0.get(), before + 1);
    }

    #[test]
    fn test_drag_pans_and_freezes_hover() {
        let mut fx = Fixture::new(10);
        fx.table.mouse_moved(&fx.redraw, vec2(50.0, 50.0));
        fx.frame().unwrap();
        fx.table
            .button_pressed(&fx.store, &fx.redraw, vec2(300.0, 300.0), PointerButton::Secondary, Modifiers::NONE)
            .unwrap();
        fx.table.mouse_moved(&fx.redraw, vec2(200.0, 250.0));
        fx.frame().unwrap();

        assert_eq!(fx.table.view().pan(), vec2(100.0, 50.0));
        assert_eq!(fx.table.view().hovered(), Some(ImageId(id(0, 0))));

        fx.table.button_released(&fx.redraw);
        fx.table.mouse_left(&fx.redraw);
        assert_eq!(fx.table.view().hovered(), None);
    }

    #[test]
    fn test_zoom_change_keeps_pointer_position() {
        let mut fx = Fixture::new(10);
        fx.table.mouse_moved(&fx.redraw, vec2(333.0, 222.0));
        fx.frame().unwrap();
        let before = fx.table.view().viewport().mosaic_point(vec2(333.0, 222.0));

        fx.table.set_zoom(7.0);
        fx.frame().unwrap();
        let after = fx.table.view().viewport().mosaic_point(vec2(333.0, 222.0));

        assert!((before.x - after.x).abs() < 1e-3);
        assert!((before.y - after.y).abs() < 1e-3);
    }

    #[test]
    fn test_center_request() {
        let mut fx = Fixture::new(10);
        fx.table.mouse_moved(&fx.redraw, vec2(100.0, 100.0));
        fx.frame().unwrap();
        fx.table.request_center();
        fx.frame().unwrap();
        assert_eq!(fx.table.view().pan(), vec2(-300.0, -200.0));

        fx.table.mouse_left(&fx.redraw);
        fx.table.request_center();
        fx.frame().unwrap();
        assert_eq!(fx.table.view().pan(), vec2(0.0, 0.0));
    }

    #[test]
    fn test_roll_change_resets_anchor_and_pan() {
        let mut fx = Fixture::new(10);
        fx.click(50.0, 50.0, Modifiers::NONE).unwrap();
        fx.table.scroll_to(7);
        assert_eq!(fx.table.view().pan(), vec2(400.0, 200.0));

        fx.table.set_roll(Some(RollId(2)));
        assert!(fx.table.selection().anchor().is_none());
        assert_eq!(fx.table.view().pan(), vec2(0.0, 0.0));
        assert_eq!(fx.table.view().hovered(), None);
    }

    #[test]
    fn test_toggle_hovered_then_anchor() {
        let mut fx = Fixture::new(10);
        fx.table.mouse_moved(&fx.redraw, vec2(450.0, 50.0));
        fx.frame().unwrap();

        fx.table.toggle_hovered(&fx.store, &fx.redraw).unwrap();
        assert_eq!(fx.selected(), vec![id(0, 2)]);

        fx.click(50.0, 50.0, Modifiers::CTRL).unwrap();
        fx.table.mouse_left(&fx.redraw);
        // nothing hovered: the anchor's image is toggled back off
        fx.table.toggle_hovered(&fx.store, &fx.redraw).unwrap();
        assert_eq!(fx.selected(), vec![id(0, 2)]);
    }

    #[test]
    fn test_clear_selection_forgets_anchor() {
        let mut fx = Fixture::new(10);
        fx.click(50.0, 50.0, Modifiers::NONE).unwrap();
        fx.click(250.0, 50.0, Modifiers::CTRL).unwrap();

        fx.table.clear_selection(&fx.store, &fx.redraw).unwrap();
        assert!(fx.selected().is_empty());
        assert!(fx.table.selection().anchor().is_none());

        fx.table.mouse_left(&fx.redraw);
        fx.table.toggle_hovered(&fx.store, &fx.redraw).unwrap();
        assert!(fx.selected().is_empty());
    }

    #[test]
    fn test_no_roll_draws_background_only() {
        let mut fx = Fixture::new(10);
        fx.table.set_roll(None);
        let surface = fx.frame().unwrap();
        assert_eq!(surface.ops.len(), 1);
        assert!(fx.roll.calls.borrow().is_empty());
    }
}
