/// Selection engine: plain, ctrl and shift-range clicks on the grid
///
/// A click gesture is applied on the first frame after the button went down,
/// cell by cell, while the grid is being resolved. Ctrl only suppresses the
/// clearing of the selection (one additive toggle); shift additionally
/// toggles every cell in the rectangle between the anchor and the clicked
/// cell. The rectangle is taken in grid cells, not enumeration order, so it
/// can span a row wrap.
use std::collections::HashSet;

use crate::error::Result;
use crate::state::data::ImageId;

use super::collab::SelectionStore;

/// Keyboard modifiers held when a gesture starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
    };
    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
    };
    pub const CTRL: Self = Self {
        shift: false,
        ctrl: true,
    };

    pub fn is_plain(&self) -> bool {
        !self.shift && !self.ctrl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
    Other,
}

/// A cell of the visible grid; may lie outside of it for pointer positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPos {
    pub row: i64,
    pub col: i64,
}

impl CellPos {
    pub fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Inside the inclusive rectangle spanned by `a` and `b`
    pub fn within(&self, a: CellPos, b: CellPos) -> bool {
        (a.col.min(b.col)..=a.col.max(b.col)).contains(&self.col)
            && (a.row.min(b.row)..=a.row.max(b.row)).contains(&self.row)
    }
}

/// Last toggled image and the cell it occupied at the time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionAnchor {
    pub image: ImageId,
    pub cell: CellPos,
}

#[derive(Debug, Clone)]
struct Gesture {
    modifiers: Modifiers,
    click_pending: bool,
    pointer: Option<CellPos>,
    pivot: Option<CellPos>,
}

#[derive(Debug, Default)]
pub struct SelectionEngine {
    anchor: Option<SelectionAnchor>,
    gesture: Option<Gesture>,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor(&self) -> Option<SelectionAnchor> {
        self.anchor
    }

    /// Forget the anchor, e.g. when another roll is shown
    pub fn reset(&mut self) {
        self.anchor = None;
        self.gesture = None;
    }

    pub fn toggle<S: SelectionStore + ?Sized>(&self, store: &S, image: ImageId) -> Result<()> {
        store.toggle(image)
    }

    pub fn clear_all<S: SelectionStore + ?Sized>(&self, store: &S) -> Result<()> {
        store.clear_all()
    }

    /// Start a gesture. A plain primary click clears the selection and the anchor.
    pub fn begin_gesture<S: SelectionStore + ?Sized>(
        &mut self,
        store: &S,
        modifiers: Modifiers,
        button: PointerButton,
    ) -> Result<()> {
        let click = button == PointerButton::Primary;
        let cleared = if click && modifiers.is_plain() {
            self.anchor = None;
            store.clear_all()
        } else {
            Ok(())
        };
        // a click whose clear failed must not toggle anything later
        self.gesture = Some(Gesture {
            modifiers,
            click_pending: click && cleared.is_ok(),
            pointer: None,
            pivot: None,
        });
        log::debug!("gesture started: {modifiers:?} {button:?}");
        cleared
    }

    pub fn end_gesture(&mut self) {
        self.gesture = None;
    }

    /// A click waits to be applied on the next frame
    pub fn has_pending_click(&self) -> bool {
        self.gesture.as_ref().is_some_and(|g| g.click_pending)
    }

    /// Arm the pending click with the cell under the pointer. With shift and
    /// range allowed, the pivot is looked up among `cells` up front, so the
    /// range does not depend on whether the anchor comes before or after the
    /// clicked cell in drawing order.
    pub fn prepare_click<I>(&mut self, pointer: Option<CellPos>, allow_range: bool, cells: I)
    where
        I: IntoIterator<Item = (ImageId, CellPos)>,
    {
        let anchor = self.anchor;
        let Some(gesture) = self.gesture.as_mut().filter(|g| g.click_pending) else {
            return;
        };
        gesture.pointer = pointer;
        gesture.pivot = None;
        if !(allow_range && gesture.modifiers.shift) {
            return;
        }
        if let Some(anchor) = anchor {
            gesture.pivot = cells
                .into_iter()
                .find(|(image, _)| *image == anchor.image)
                .map(|(_, cell)| cell);
        }
    }

    /// Apply the pending click to one resolved cell. Returns whether the
    /// image was toggled. A failed toggle leaves the anchor untouched.
    pub fn apply_click<S: SelectionStore + ?Sized>(
        &mut self,
        store: &S,
        image: ImageId,
        cell: CellPos,
    ) -> Result<bool> {
        let anchor_image = self.anchor.map(|a| a.image);
        let Some(gesture) = self.gesture.as_mut().filter(|g| g.click_pending) else {
            return Ok(false);
        };
        let shift = gesture.modifiers.shift;
        if shift && gesture.pivot.is_none() && anchor_image == Some(image) {
            gesture.pivot = Some(cell);
        }

        let in_range = match (shift, gesture.pivot, gesture.pointer) {
            (true, Some(pivot), Some(pointer)) => cell != pivot && cell.within(pivot, pointer),
            _ => false,
        };
        let under_pointer = gesture.pointer == Some(cell);
        if !(in_range || under_pointer) {
            return Ok(false);
        }

        store.toggle(image)?;
        self.anchor = Some(SelectionAnchor { image, cell });
        Ok(true)
    }

    /// The click has been applied; later frames of the gesture only pan
    pub fn finish_click(&mut self) {
        if let Some(gesture) = self.gesture.as_mut() {
            gesture.click_pending = false;
            gesture.pivot = None;
        }
    }

    /// Fetch the whole selection once for a frame
    pub fn snapshot<S: SelectionStore + ?Sized>(&self, store: &S) -> Result<SelectionSnapshot> {
        Ok(SelectionSnapshot(store.all()?))
    }
}

/// Selection as of the start of drawing a frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSnapshot(HashSet<ImageId>);

impl SelectionSnapshot {
    pub fn is_selected(&self, image: ImageId) -> bool {
        self.0.contains(&image)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
