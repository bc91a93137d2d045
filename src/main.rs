use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming};
use iced::keyboard::{self, key::Named, Key};
use iced::widget::{button, canvas, column, container, row, scrollable, text, Column};
use iced::{Element, Length, Subscription, Task, Theme};
use rfd::FileDialog;
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;

mod cache;
mod config;
mod error;
mod lighttable;
mod state;
mod ui;

use cache::{catalog_loader, thumbnail_cache_dir, MipCache, ThumbnailGenerator};
use config::Settings;
use lighttable::LightTable;
use state::data::{FilmRoll, ImportResult, RollId};
use state::library::Library;
use ui::{CanvasEvent, LightTableCanvas};

/// Main application state
struct LightTableApp {
    /// The catalog database
    library: Library,
    /// Zoom, pan, hover and the pending click of the light table
    table: RefCell<LightTable>,
    thumbnails: MipCache,
    /// Geometry of the last drawn frame
    frame_cache: canvas::Cache,
    rolls: Vec<FilmRoll>,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// User clicked the "Import Folder" button
    ImportFolder,
    /// Background import finished
    ImportComplete(Result<ImportResult, String>),
    RollSelected(RollId),
    /// Pointer input on the light table
    Canvas(CanvasEvent),
    /// Zoom by whole levels; positive shows more cells
    Zoom(i32),
    Center,
    Home,
    /// Toggle the image under the pointer
    ToggleHovered,
    ClearSelection,
    /// Periodic check for freshly decoded thumbnails
    Tick,
}

impl LightTableApp {
    /// Open the catalog and start the thumbnail loader
    fn boot(settings: &Settings) -> error::Result<Self> {
        let library = Library::new()?;
        let db_path = library.path()?.to_path_buf();
        let generator = ThumbnailGenerator::new(thumbnail_cache_dir()?)?;
        let thumbnails = MipCache::new(settings.cache_capacity, catalog_loader(&db_path, generator)?)?;

        let rolls = library.film_rolls()?;
        let mut table = LightTable::new(settings);
        table.set_roll(rolls.first().map(|r| r.id));

        let image_count = library.image_count()?;
        log::info!("🎨 Light table initialized with {} images in {} rolls", image_count, rolls.len());

        Ok(Self {
            library,
            table: RefCell::new(table),
            thumbnails,
            frame_cache: canvas::Cache::new(),
            rolls,
            status: format!("Ready. {} images in library.", image_count),
        })
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ImportFolder => {
                // Show the native folder picker dialog
                let folder = FileDialog::new()
                    .set_title("Select Folder with Photos")
                    .pick_folder();

                if let Some(folder_path) = folder {
                    match self.library.path() {
                        Ok(db_path) => {
                            self.status = format!("Importing from {}...", folder_path.display());
                            return Task::perform(
                                import_folder_async(folder_path, db_path.to_path_buf()),
                                Message::ImportComplete,
                            );
                        }
                        Err(e) => {
                            log::error!("❌ Import unavailable: {}", e);
                            self.status = format!("❌ Import failed: {}", e);
                        }
                    }
                }
            }
            Message::ImportComplete(Ok(result)) => {
                self.status = format!(
                    "✅ Import complete! Added {} images, skipped {} duplicates.",
                    result.imported_count, result.skipped_count
                );
                self.refresh_rolls();
                self.thumbnails.retry_failed();
                self.table.get_mut().set_roll(Some(result.roll));
                self.frame_cache.clear();
            }
            Message::ImportComplete(Err(e)) => {
                log::error!("Import failed: {}", e);
                self.status = format!("❌ Import failed: {}", e);
            }
            Message::RollSelected(roll) => {
                self.table.get_mut().set_roll(Some(roll));
                self.frame_cache.clear();
                match self.library.roll_image_count(roll) {
                    Ok(count) => self.status = format!("{} images in this roll.", count),
                    Err(e) => log::warn!("Could not count roll images: {}", e),
                }
            }
            Message::Canvas(event) => self.on_canvas(event),
            Message::Zoom(steps) => {
                self.table.get_mut().zoom_by(steps);
                self.frame_cache.clear();
            }
            Message::Center => {
                self.table.get_mut().request_center();
                self.frame_cache.clear();
            }
            Message::Home => {
                self.table.get_mut().scroll_to(0);
                self.frame_cache.clear();
            }
            Message::ToggleHovered => {
                let toggled = self.table.get_mut().toggle_hovered(&self.library, &self.frame_cache);
                self.report_selection_error(toggled);
            }
            Message::ClearSelection => {
                let cleared = self.table.get_mut().clear_selection(&self.library, &self.frame_cache);
                self.report_selection_error(cleared);
            }
            Message::Tick => {
                if self.thumbnails.take_fresh() {
                    log::debug!(
                        "Thumbnails: {} cached, {} leased",
                        self.thumbnails.len(),
                        self.thumbnails.leased()
                    );
                    self.frame_cache.clear();
                }
            }
        }
        Task::none()
    }

    fn on_canvas(&mut self, event: CanvasEvent) {
        let table = self.table.get_mut();
        match event {
            CanvasEvent::Pressed {
                pointer,
                button,
                modifiers,
            } => {
                let pressed = table.button_pressed(&self.library, &self.frame_cache, pointer, button, modifiers);
                self.report_selection_error(pressed);
            }
            CanvasEvent::Released => table.button_released(&self.frame_cache),
            CanvasEvent::Moved(pointer) => table.mouse_moved(&self.frame_cache, pointer),
            CanvasEvent::Left => table.mouse_left(&self.frame_cache),
            CanvasEvent::Scrolled(steps) => {
                table.zoom_by(steps);
                self.frame_cache.clear();
            }
        }
    }

    fn report_selection_error(&mut self, result: error::Result<()>) {
        if let Err(e) = result {
            log::warn!("Selection update failed: {}", e);
            self.status = format!("⚠️ {}", e);
        }
    }

    fn refresh_rolls(&mut self) {
        match self.library.film_rolls() {
            Ok(rolls) => self.rolls = rolls,
            Err(e) => log::error!("Could not list film rolls: {}", e),
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let table = self.table.borrow();
        let current = table.roll();
        let view = table.snapshot();
        let selected = match table.selection().snapshot(&self.library) {
            Ok(selection) if selection.is_empty() => "Selected: none".to_string(),
            Ok(selection) => format!("Selected: {}", selection.len()),
            Err(e) => format!("Selected: unavailable ({})", e),
        };
        let hovered = match view.hovered {
            Some(id) => format!("Image: #{}", id),
            None => "Image: -".to_string(),
        };
        drop(table);

        let rolls: Column<Message> = self
            .rolls
            .iter()
            .fold(column![].spacing(4), |list, roll| {
                let style: fn(&Theme, button::Status) -> button::Style = if Some(roll.id) == current {
                    button::primary
                } else {
                    button::secondary
                };
                list.push(
                    button(text(format!("{} ({})", roll_name(roll), roll.image_count)).size(14))
                        .on_press(Message::RollSelected(roll.id))
                        .style(style)
                        .width(Length::Fill),
                )
            });

        let panel = column![
            text("Light Table").size(28),
            button("Import Folder")
                .on_press(Message::ImportFolder)
                .padding(10),
            text("Film rolls").size(16),
            scrollable(rolls).height(Length::Fill),
            text(format!("Zoom: {} per row", view.zoom.round())).size(14),
            text(hovered).size(14),
            text(selected).size(14),
            text(&self.status).size(14),
        ]
        .spacing(12)
        .padding(16)
        .width(Length::Fixed(260.0));

        let table = canvas(LightTableCanvas {
            table: &self.table,
            library: &self.library,
            thumbnails: &self.thumbnails,
            cache: &self.frame_cache,
        })
        .width(Length::Fill)
        .height(Length::Fill);

        container(row![panel, table])
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            iced::time::every(Duration::from_millis(100)).map(|_| Message::Tick),
            keyboard::on_key_press(key_binding),
        ])
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn key_binding(key: Key, _modifiers: keyboard::Modifiers) -> Option<Message> {
    match key.as_ref() {
        Key::Character("+") | Key::Character("=") => Some(Message::Zoom(-1)),
        Key::Character("-") => Some(Message::Zoom(1)),
        Key::Character("c") => Some(Message::Center),
        Key::Named(Named::Home) => Some(Message::Home),
        Key::Named(Named::Space) => Some(Message::ToggleHovered),
        Key::Named(Named::Escape) => Some(Message::ClearSelection),
        _ => None,
    }
}

/// Last path component of a roll's folder
fn roll_name(roll: &FilmRoll) -> &str {
    roll.folder
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or(&roll.folder)
}

/// Import all supported files from a folder on a blocking worker thread
async fn import_folder_async(folder_path: PathBuf, db_path: PathBuf) -> Result<ImportResult, String> {
    tokio::task::spawn_blocking(move || {
        // rusqlite::Connection is not Sync, so the worker opens its own
        let library = Library::open(&db_path)?;
        library.import_folder(&folder_path)
    })
    .await
    .map_err(|e| e.to_string())?
    .map_err(|e| e.to_string())
}

fn log_dir() -> Option<PathBuf> {
    let dir = dirs::data_dir()?.join("lighttable").join("logs");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

fn start_logging() -> Option<LoggerHandle> {
    let dir = log_dir()?;
    let started = Logger::try_with_env_or_str("info, iced=error, wgpu_hal=error, wgpu_core=error")
        .map(|logger| {
            logger
                .log_to_file(FileSpec::default().directory(&dir).basename("lighttable").suffix("log").suppress_timestamp())
                .rotate(Criterion::Size(64 * 1024), Naming::Numbers, Cleanup::KeepLogFiles(3))
                .duplicate_to_stderr(flexi_logger::Duplicate::Warn)
        })
        .and_then(|logger| logger.start());
    match started {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Failed to start logging: {}", e);
            None
        }
    }
}

fn main() -> iced::Result {
    let _logger = start_logging();

    let settings = match Settings::default_path() {
        Some(path) => Settings::load_or_create(&path).unwrap_or_else(|e| {
            log::warn!("Using default settings, {} is unusable: {}", path.display(), e);
            Settings::default()
        }),
        None => Settings::default(),
    };

    let app = match LightTableApp::boot(&settings) {
        Ok(app) => app,
        Err(e) => {
            log::error!("❌ Could not start the light table: {}", e);
            eprintln!("Could not start the light table: {}", e);
            std::process::exit(1);
        }
    };

    iced::application("Light Table", LightTableApp::update, LightTableApp::view)
        .theme(LightTableApp::theme)
        .subscription(LightTableApp::subscription)
        .centered()
        .run_with(move || (app, Task::none()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        let none = keyboard::Modifiers::default();
        assert!(matches!(key_binding(Key::Character("+".into()), none), Some(Message::Zoom(-1))));
        assert!(matches!(key_binding(Key::Character("-".into()), none), Some(Message::Zoom(1))));
        assert!(matches!(key_binding(Key::Character("c".into()), none), Some(Message::Center)));
        assert!(matches!(key_binding(Key::Named(Named::Home), none), Some(Message::Home)));
        assert!(matches!(key_binding(Key::Named(Named::Space), none), Some(Message::ToggleHovered)));
        assert!(matches!(key_binding(Key::Named(Named::Escape), none), Some(Message::ClearSelection)));
        assert!(key_binding(Key::Character("x".into()), none).is_none());
    }

    #[test]
    fn test_roll_name() {
        let roll = |folder: &str| FilmRoll {
            id: RollId(1),
            folder: folder.to_string(),
            image_count: 0,
        };
        assert_eq!(roll_name(&roll("/photos/2024/trip")), "trip");
        assert_eq!(roll_name(&roll("/photos/trip/")), "trip");
        assert_eq!(roll_name(&roll("C:\\shots\\day1")), "day1");
    }
}
