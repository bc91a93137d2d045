pub mod canvas;

pub use canvas::{CanvasEvent, LightTableCanvas};
