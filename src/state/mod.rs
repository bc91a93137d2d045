/// State management module
///
/// This module handles all application state, including:
/// - Catalog connection and queries (library.rs)
/// - Shared data structures (data.rs)
/// - Viewport, hover and pan state of the light table (view.rs)

pub mod library;
pub mod data;
pub mod view;
