use cgmath::{vec2, Vector2};
use iced::alignment;
use iced::keyboard;
use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, fill, Fill, Frame, Path, Program, Stroke, Style};
use iced::widget::image::Handle;
use iced::{Color, Pixels, Point, Rectangle, Renderer, Size, Theme};
use std::cell::RefCell;

use crate::cache::MipCache;
use crate::lighttable::collab::RedrawSink;
use crate::lighttable::geometry::CellRect;
use crate::lighttable::render::{Rgba, Surface};
use crate::lighttable::selection::{Modifiers, PointerButton};
use crate::lighttable::LightTable;
use crate::state::library::Library;
use crate::Message;

/// Pointer input of the light table, in canvas coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    Pressed {
        pointer: Vector2<f32>,
        button: PointerButton,
        modifiers: Modifiers,
    },
    Released,
    Moved(Vector2<f32>),
    Left,
    /// Wheel steps; positive zooms out
    Scrolled(i32),
}

/// Canvas drawing the light table of the current film roll
pub struct LightTableCanvas<'a> {
    pub table: &'a RefCell<LightTable>,
    pub library: &'a Library,
    pub thumbnails: &'a MipCache,
    /// Geometry of the last frame; cleared whenever the table needs a redraw
    pub cache: &'a canvas::Cache,
}

/// Input tracking between events
#[derive(Debug, Clone, Default)]
pub struct CanvasState {
    modifiers: keyboard::Modifiers,
    inside: bool,
}

impl Program<Message> for LightTableCanvas<'_> {
    type State = CanvasState;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let geometry = self.cache.draw(renderer, bounds.size(), |frame| {
            let mut table = self.table.borrow_mut();
            table.resize(bounds.width, bounds.height);
            let mut surface = FrameSurface { frame };
            if let Err(e) = table.expose(self.library, self.library, self.thumbnails, &mut surface) {
                log::error!("❌ Light table frame failed: {}", e);
            }
        });
        vec![geometry]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        let position = cursor.position_in(bounds).map(|p| vec2(p.x, p.y));

        match event {
            canvas::Event::Keyboard(keyboard::Event::ModifiersChanged(modifiers)) => {
                state.modifiers = modifiers;
            }

            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => match position {
                Some(pointer) => {
                    state.inside = true;
                    return captured(CanvasEvent::Moved(pointer));
                }
                None if state.inside => {
                    state.inside = false;
                    return captured(CanvasEvent::Left);
                }
                None => {}
            },

            canvas::Event::Mouse(mouse::Event::CursorLeft) if state.inside => {
                state.inside = false;
                return captured(CanvasEvent::Left);
            }

            canvas::Event::Mouse(mouse::Event::ButtonPressed(button)) => {
                if let Some(pointer) = position {
                    return captured(CanvasEvent::Pressed {
                        pointer,
                        button: pointer_button(button),
                        modifiers: Modifiers {
                            shift: state.modifiers.shift(),
                            ctrl: state.modifiers.command(),
                        },
                    });
                }
            }

            // released anywhere, so a drag that leaves the canvas still ends
            canvas::Event::Mouse(mouse::Event::ButtonReleased(_)) => {
                return captured(CanvasEvent::Released);
            }

            canvas::Event::Mouse(mouse::Event::WheelScrolled { delta }) if position.is_some() => {
                let y = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => y,
                    mouse::ScrollDelta::Pixels { y, .. } => y / 40.0,
                };
                if y != 0.0 {
                    // wheel up shows fewer, larger cells
                    let steps = -(y.signum() as i32);
                    return captured(CanvasEvent::Scrolled(steps));
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn mouse_interaction(&self, _state: &Self::State, bounds: Rectangle, cursor: Cursor) -> mouse::Interaction {
        if !cursor.is_over(bounds) {
            mouse::Interaction::default()
        } else if self.table.borrow().view().pan_active() {
            mouse::Interaction::Grabbing
        } else {
            mouse::Interaction::Pointer
        }
    }
}

fn captured(event: CanvasEvent) -> (canvas::event::Status, Option<Message>) {
    (canvas::event::Status::Captured, Some(Message::Canvas(event)))
}

fn pointer_button(button: mouse::Button) -> PointerButton {
    match button {
        mouse::Button::Left => PointerButton::Primary,
        mouse::Button::Right => PointerButton::Secondary,
        mouse::Button::Middle => PointerButton::Middle,
        _ => PointerButton::Other,
    }
}

impl RedrawSink for canvas::Cache {
    fn request_redraw(&self) {
        self.clear();
    }
}

/// Light table drawing primitives on top of a canvas frame
pub struct FrameSurface<'f> {
    frame: &'f mut Frame,
}

fn color(c: Rgba) -> Color {
    Color::from_rgba(c.r, c.g, c.b, c.a)
}

fn top_left(rect: CellRect) -> Point {
    Point::new(rect.x, rect.y)
}

fn size(rect: CellRect) -> Size {
    Size::new(rect.width, rect.height)
}

impl Surface for FrameSurface<'_> {
    type Bitmap = Handle;

    fn fill_rect(&mut self, rect: CellRect, c: Rgba) {
        self.frame.fill_rectangle(top_left(rect), size(rect), color(c));
    }

    fn stroke_rect(&mut self, rect: CellRect, width: f32, c: Rgba) {
        let path = Path::rectangle(top_left(rect), size(rect));
        self.frame
            .stroke(&path, Stroke::default().with_color(color(c)).with_width(width));
    }

    fn fill_ring(&mut self, outer: CellRect, inner: CellRect, c: Rgba) {
        let path = Path::new(|builder| {
            builder.rectangle(top_left(outer), size(outer));
            builder.rectangle(top_left(inner), size(inner));
        });
        self.frame.fill(
            &path,
            Fill {
                style: Style::Solid(color(c)),
                rule: fill::Rule::EvenOdd,
            },
        );
    }

    fn fill_text(&mut self, origin: Vector2<f32>, text_size: f32, text: &str, c: Rgba) {
        self.frame.fill_text(canvas::Text {
            content: text.to_string(),
            position: Point::new(origin.x, origin.y),
            color: color(c),
            size: Pixels(text_size),
            vertical_alignment: alignment::Vertical::Bottom,
            ..canvas::Text::default()
        });
    }

    fn draw_bitmap(&mut self, bitmap: &Handle, dest: CellRect) {
        self.frame
            .draw_image(Rectangle::new(top_left(dest), size(dest)), bitmap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_mapping() {
        assert_eq!(pointer_button(mouse::Button::Left), PointerButton::Primary);
        assert_eq!(pointer_button(mouse::Button::Right), PointerButton::Secondary);
        assert_eq!(pointer_button(mouse::Button::Middle), PointerButton::Middle);
        assert_eq!(pointer_button(mouse::Button::Back), PointerButton::Other);
    }

    #[test]
    fn test_color_conversion() {
        let c = color(Rgba::black(0.25));
        assert_eq!((c.r, c.g, c.b, c.a), (0.0, 0.0, 0.0, 0.25));
        assert_eq!(color(Rgba::gray(0.5)).g, 0.5);
    }

    #[test]
    fn test_cache_is_a_redraw_sink() {
        let cache = canvas::Cache::new();
        let sink: &dyn RedrawSink = &cache;
        sink.request_redraw();
    }
}
