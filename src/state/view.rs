/// View state of the light table
///
/// One `ViewState` is owned by the light table and lives for the whole
/// session. Peer panels read it through `ViewSnapshot` copies instead of
/// sharing mutable globals.
use cgmath::{vec2, Vector2};

use super::data::ImageId;

/// Zoom, pan and viewport size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    /// Cells across the viewport width; 1 means a single full-size image
    pub zoom: f32,
    /// Pan offset in pixels, relative to the origin of the mosaic
    pub pan: Vector2<f32>,
    /// Viewport width in pixels
    pub width: f32,
    /// Viewport height in pixels
    pub height: f32,
}

impl ViewportState {
    pub fn new(zoom: f32, width: f32, height: f32) -> Self {
        Self {
            zoom,
            pan: vec2(0.0, 0.0),
            width,
            height,
        }
    }

    /// Clamp zoom to [1, max_zoom] and the viewport to at least one pixel.
    /// Non-finite values fall back to the nearest sane value.
    pub fn sanitized(self, max_zoom: f32) -> Self {
        let max_zoom = if max_zoom.is_finite() { max_zoom.max(1.0) } else { 1.0 };
        let zoom = if self.zoom.is_finite() {
            self.zoom.clamp(1.0, max_zoom)
        } else {
            1.0
        };
        let finite_or = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        Self {
            zoom,
            pan: vec2(finite_or(self.pan.x, 0.0), finite_or(self.pan.y, 0.0)),
            width: finite_or(self.width, 1.0).max(1.0),
            height: finite_or(self.height, 1.0).max(1.0),
        }
    }

    /// Single-image mode
    pub fn is_single(&self) -> bool {
        self.zoom == 1.0
    }

    /// Edge length of a (square) cell in pixels
    pub fn cell_size(&self) -> f32 {
        self.width / self.zoom
    }

    /// Mosaic coordinate, in cells, of a pixel in the viewport
    pub fn mosaic_point(&self, pointer: Vector2<f32>) -> Vector2<f32> {
        let cell = self.cell_size();
        vec2((pointer.x + self.pan.x) / cell, (pointer.y + self.pan.y) / cell)
    }
}

/// Read-only copy of the view state handed to peer panels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSnapshot {
    pub zoom: f32,
    pub pan: Vector2<f32>,
    pub hovered: Option<ImageId>,
    pub pan_active: bool,
}

/// The light table's process-wide view state, with a single writer
#[derive(Debug, Clone)]
pub struct ViewState {
    viewport: ViewportState,
    hovered: Option<ImageId>,
    pan_active: bool,
    center_requested: bool,
    pointer: Option<Vector2<f32>>,
}

impl ViewState {
    pub fn new(zoom: f32) -> Self {
        Self {
            viewport: ViewportState::new(zoom, 1.0, 1.0),
            hovered: None,
            pan_active: false,
            center_requested: false,
            pointer: None,
        }
    }

    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: ViewportState) {
        self.viewport = viewport;
    }

    pub fn zoom(&self) -> f32 {
        self.viewport.zoom
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.viewport.zoom = zoom;
    }

    pub fn pan(&self) -> Vector2<f32> {
        self.viewport.pan
    }

    pub fn set_pan(&mut self, pan: Vector2<f32>) {
        self.viewport.pan = pan;
    }

    pub fn set_size(&mut self, width: f32, height: f32) {
        self.viewport.width = width;
        self.viewport.height = height;
    }

    pub fn hovered(&self) -> Option<ImageId> {
        self.hovered
    }

    pub fn set_hovered(&mut self, hovered: Option<ImageId>) {
        self.hovered = hovered;
    }

    pub fn pan_active(&self) -> bool {
        self.pan_active
    }

    pub fn set_pan_active(&mut self, active: bool) {
        self.pan_active = active;
    }

    pub fn pointer(&self) -> Option<Vector2<f32>> {
        self.pointer
    }

    pub fn set_pointer(&mut self, pointer: Option<Vector2<f32>>) {
        self.pointer = pointer;
    }

    pub fn request_center(&mut self) {
        self.center_requested = true;
    }

    /// Returns whether a center was requested and clears the request
    pub fn take_center_request(&mut self) -> bool {
        std::mem::take(&mut self.center_requested)
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            zoom: self.viewport.zoom,
            pan: self.viewport.pan,
            hovered: self.hovered,
            pan_active: self.pan_active,
        }
    }
}
