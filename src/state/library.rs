use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::data::{FilmRoll, ImageId, ImageRef, ImportResult, RollId};
use crate::error::{Error, Result};
use crate::lighttable::collab::{ImageEnumerator, SelectionStore};

/// File extensions picked up by a folder import: RAW formats plus the
/// raster formats the thumbnail loader can decode directly
pub const IMPORT_EXTENSIONS: &[&str] = &[
    "nef", "dng", "cr2", "cr3", "arw", "raf", "orf", "rw2", "pef", "srw", "erf", "kdc", "dcr",
    "mos", "raw", "rwl", "jpg", "jpeg", "png", "tif", "tiff", "webp",
];

/// The Library manages the SQLite catalog database.
/// It stores film rolls, the images they contain and the current selection.
pub struct Library {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl Library {
    /// Open the catalog in the user's data directory:
    /// - Linux: ~/.local/share/lighttable/library.db
    /// - macOS: ~/Library/Application Support/lighttable/library.db
    /// - Windows: %APPDATA%\lighttable\library.db
    pub fn new() -> Result<Self> {
        let db_path = Self::default_db_path().ok_or(Error::NoCacheDir)?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(&db_path)
    }

    /// Open or create the catalog at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        log::info!("📁 Catalog opened at: {}", path.display());
        let library = Library {
            conn,
            db_path: Some(path.to_path_buf()),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Catalog that lives only as long as this value
    pub fn open_in_memory() -> Result<Self> {
        let library = Library {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        library.init_schema()?;
        Ok(library)
    }

    fn default_db_path() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
        path.push("lighttable");
        path.push("library.db");
        Some(path)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS film_rolls (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                folder          TEXT NOT NULL UNIQUE,
                imported_at     INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS images (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                film_id         INTEGER NOT NULL REFERENCES film_rolls(id) ON DELETE CASCADE,
                path            TEXT NOT NULL UNIQUE,
                filename        TEXT NOT NULL,
                imported_at     INTEGER NOT NULL,
                cache_status    TEXT DEFAULT 'pending',
                thumbnail_path  TEXT,
                file_status     TEXT DEFAULT 'exists'
            );

            CREATE TABLE IF NOT EXISTS selected_images (
                imgid           INTEGER PRIMARY KEY REFERENCES images(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_images_film_filename
             ON images(film_id, filename);",
        )?;
        Ok(())
    }

    /// Path of the database file, `None` for an in-memory catalog
    pub fn path(&self) -> Result<&Path> {
        self.db_path.as_deref().ok_or(Error::InMemoryCatalog)
    }

    /// Get a count of images in the library
    pub fn image_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn roll_image_count(&self, roll: RollId) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM images WHERE film_id = ?1",
            [roll.0],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// All film rolls with their image counts, by folder name
    pub fn film_rolls(&self) -> Result<Vec<FilmRoll>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.folder, COUNT(i.id)
             FROM film_rolls f LEFT JOIN images i ON i.film_id = f.id
             GROUP BY f.id ORDER BY f.folder",
        )?;
        let rolls = stmt
            .query_map([], |row| {
                Ok(FilmRoll {
                    id: RollId(row.get(0)?),
                    folder: row.get(1)?,
                    image_count: row.get::<_, i64>(2)?.max(0) as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rolls)
    }

    /// Film roll for `folder`, created on first use
    pub fn film_roll_for_folder(&self, folder: &str) -> Result<RollId> {
        self.conn.execute(
            "INSERT OR IGNORE INTO film_rolls (folder, imported_at) VALUES (?1, ?2)",
            params![folder, Utc::now().timestamp()],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM film_rolls WHERE folder = ?1",
            [folder],
            |row| row.get(0),
        )?;
        Ok(RollId(id))
    }

    /// Import a new image into a film roll.
    /// Returns the new image ID, or `None` if the path is already cataloged.
    pub fn import_image(&self, roll: RollId, path: &str, filename: &str) -> Result<Option<ImageId>> {
        let result = self.conn.execute(
            "INSERT INTO images (film_id, path, filename, imported_at) VALUES (?1, ?2, ?3, ?4)",
            params![roll.0, path, filename, Utc::now().timestamp()],
        );
        match result {
            Ok(_) => Ok(Some(ImageId(self.conn.last_insert_rowid()))),
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Import every supported file below `folder` into one film roll
    pub fn import_folder(&self, folder: &Path) -> Result<ImportResult> {
        log::info!("🔍 Scanning folder: {}", folder.display());
        let roll = self.film_roll_for_folder(&folder.to_string_lossy())?;
        let mut imported_count = 0;
        let mut skipped_count = 0;

        let tx = self.conn.unchecked_transaction()?;
        for entry in WalkDir::new(folder)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || !has_import_extension(path) {
                continue;
            }
            let filename = path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            match self.import_image(roll, &path.to_string_lossy(), &filename) {
                Ok(Some(_)) => {
                    imported_count += 1;
                    if imported_count % 100 == 0 {
                        log::info!("⏳ Imported {} files...", imported_count);
                    }
                }
                Ok(None) => skipped_count += 1,
                Err(e) => log::warn!("Error importing {}: {}", filename, e),
            }
        }
        tx.commit()?;

        log::info!(
            "✅ Import complete: {} new, {} skipped",
            imported_count,
            skipped_count
        );
        Ok(ImportResult {
            roll,
            imported_count,
            skipped_count,
        })
    }

    /// Path of the source file of an image
    pub fn image_path(&self, id: ImageId) -> Result<PathBuf> {
        let path: Option<String> = self
            .conn
            .query_row("SELECT path FROM images WHERE id = ?1", [id.0], |row| row.get(0))
            .optional()?;
        path.map(PathBuf::from).ok_or(Error::UnknownImage(id.0))
    }

    /// Record a generated thumbnail and mark the image as cached
    pub fn update_thumbnail(&self, id: ImageId, thumbnail_path: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE images SET thumbnail_path = ?1, cache_status = 'cached' WHERE id = ?2",
            params![thumbnail_path, id.0],
        )?;
        Ok(())
    }
}

fn has_import_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMPORT_EXTENSIONS.contains(&ext.as_str()))
}

impl ImageEnumerator for Library {
    fn enumerate(&self, roll: RollId, offset: u64, limit: usize) -> Result<Vec<ImageRef>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, filename FROM images WHERE film_id = ?1
             ORDER BY filename, id LIMIT ?2 OFFSET ?3",
        )?;
        let offset_sql = i64::try_from(offset).unwrap_or(i64::MAX);
        let limit_sql = i64::try_from(limit).unwrap_or(i64::MAX);
        let images = stmt
            .query_map(params![roll.0, limit_sql, offset_sql], |row| {
                Ok((ImageId(row.get(0)?), row.get::<_, String>(1)?))
            })?
            .enumerate()
            .map(|(i, row)| {
                row.map(|(id, filename)| ImageRef {
                    id,
                    position: offset + i as u64,
                    filename,
                })
            })
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }
}

fn selection_unavailable(e: rusqlite::Error) -> Error {
    Error::SelectionUnavailable(e.to_string())
}

impl Library {
    fn toggle_selected(&self, id: ImageId) -> rusqlite::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM selected_images WHERE imgid = ?1", [id.0])?;
        if removed == 0 {
            // only images that exist in the catalog can be selected
            tx.execute(
                "INSERT INTO selected_images (imgid) SELECT id FROM images WHERE id = ?1",
                [id.0],
            )?;
        }
        tx.commit()
    }

    fn selected_ids(&self) -> rusqlite::Result<HashSet<ImageId>> {
        let mut stmt = self.conn.prepare_cached("SELECT imgid FROM selected_images")?;
        let ids = stmt
            .query_map([], |row| Ok(ImageId(row.get(0)?)))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }
}

impl SelectionStore for Library {
    fn toggle(&self, id: ImageId) -> Result<()> {
        self.toggle_selected(id).map_err(selection_unavailable)
    }

    fn clear_all(&self) -> Result<()> {
        self.conn
            .execute("DELETE FROM selected_images", [])
            .map_err(selection_unavailable)?;
        Ok(())
    }

    fn contains(&self, id: ImageId) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM selected_images WHERE imgid = ?1",
                [id.0],
                |_| Ok(()),
            )
            .optional()
            .map_err(selection_unavailable)?;
        Ok(found.is_some())
    }

    fn all(&self) -> Result<HashSet<ImageId>> {
        self.selected_ids().map_err(selection_unavailable)
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Catalog with one roll whose files are imported out of order
    fn library_with_roll(names: &[&str]) -> (Library, RollId) {
        let library = Library::open_in_memory().unwrap();
        let roll = library.film_roll_for_folder("/photos/trip").unwrap();
        for name in names {
            library
                .import_image(roll, &format!("/photos/trip/{name}"), name)
                .unwrap();
        }
        (library, roll)
    }

    fn filenames(images: &[ImageRef]) -> Vec<&str> {
        images.iter().map(|i| i.filename.as_str()).collect()
    }

    #[test]
    fn test_enumeration_is_ordered_by_filename() {
        let (library, roll) = library_with_roll(&["c.nef", "a.nef", "d.nef", "b.nef"]);
        let images = library.enumerate(roll, 0, 10).unwrap();

        assert_eq!(filenames(&images), vec!["a.nef", "b.nef", "c.nef", "d.nef"]);
        assert_eq!(
            images.iter().map(|i| i.position).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_enumeration_window_and_short_result() {
        let (library, roll) = library_with_roll(&["c.nef", "a.nef", "d.nef", "b.nef"]);

        let window = library.enumerate(roll, 1, 2).unwrap();
        assert_eq!(filenames(&window), vec!["b.nef", "c.nef"]);
        assert_eq!(window[0].position, 1);

        let short = library.enumerate(roll, 3, 5).unwrap();
        assert_eq!(filenames(&short), vec!["d.nef"]);

        assert!(library.enumerate(roll, 10, 5).unwrap().is_empty());
    }

    #[test]
    fn test_enumeration_is_per_roll() {
        let (library, roll) = library_with_roll(&["a.nef"]);
        let other = library.film_roll_for_folder("/photos/other").unwrap();
        library.import_image(other, "/photos/other/z.nef", "z.nef").unwrap();

        assert_eq!(filenames(&library.enumerate(roll, 0, 5).unwrap()), vec!["a.nef"]);
        assert_eq!(filenames(&library.enumerate(other, 0, 5).unwrap()), vec!["z.nef"]);
        assert_eq!(library.roll_image_count(other).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_import_is_skipped() {
        let (library, roll) = library_with_roll(&["a.nef"]);
        let again = library
            .import_image(roll, "/photos/trip/a.nef", "a.nef")
            .unwrap();
        assert_eq!(again, None);
        assert_eq!(library.image_count().unwrap(), 1);
    }

    #[test]
    fn test_toggle_twice_restores_membership() {
        let (library, roll) = library_with_roll(&["a.nef", "b.nef"]);
        let id = library.enumerate(roll, 0, 1).unwrap()[0].id;

        library.toggle(id).unwrap();
        assert!(library.contains(id).unwrap());
        library.toggle(id).unwrap();
        assert!(!library.contains(id).unwrap());
    }

    #[test]
    fn test_clear_and_all() {
        let (library, roll) = library_with_roll(&["a.nef", "b.nef", "c.nef"]);
        let ids: Vec<_> = library.enumerate(roll, 0, 3).unwrap().iter().map(|i| i.id).collect();
        library.toggle(ids[0]).unwrap();
        library.toggle(ids[2]).unwrap();

        assert_eq!(library.all().unwrap(), HashSet::from([ids[0], ids[2]]));
        library.clear_all().unwrap();
        assert!(library.all().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_image_is_never_selected() {
        let (library, _) = library_with_roll(&["a.nef"]);
        library.toggle(ImageId(4242)).unwrap();
        assert!(library.all().unwrap().is_empty());
    }

    #[test]
    fn test_film_rolls_listing() {
        let (library, roll) = library_with_roll(&["a.nef", "b.nef"]);
        assert_eq!(library.film_roll_for_folder("/photos/trip").unwrap(), roll);

        let rolls = library.film_rolls().unwrap();
        assert_eq!(rolls.len(), 1);
        assert_eq!(rolls[0].folder, "/photos/trip");
        assert_eq!(rolls[0].image_count, 2);
    }

    #[test]
    fn test_import_folder_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.NEF"), b"raw").unwrap();
        std::fs::write(dir.path().join("two.jpg"), b"jpg").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("three.dng"), b"raw").unwrap();

        let library = Library::open_in_memory().unwrap();
        let first = library.import_folder(dir.path()).unwrap();
        assert_eq!(first.imported_count, 3);
        assert_eq!(first.skipped_count, 0);

        let second = library.import_folder(dir.path()).unwrap();
        assert_eq!(second.roll, first.roll);
        assert_eq!(second.imported_count, 0);
        assert_eq!(second.skipped_count, 3);
    }

    #[test]
    fn test_image_path_and_thumbnail_update() {
        let (library, roll) = library_with_roll(&["a.nef"]);
        let id = library.enumerate(roll, 0, 1).unwrap()[0].id;

        assert_eq!(library.image_path(id).unwrap(), PathBuf::from("/photos/trip/a.nef"));
        assert!(matches!(library.image_path(ImageId(999)), Err(Error::UnknownImage(999))));
        library.update_thumbnail(id, "/cache/1_256.jpg").unwrap();
    }

    #[test]
    fn test_catalog_file_persists_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");
        let id = {
            let library = Library::open(&path).unwrap();
            let roll = library.film_roll_for_folder("/photos").unwrap();
            let id = library.import_image(roll, "/photos/a.nef", "a.nef").unwrap().unwrap();
            library.toggle(id).unwrap();
            id
        };
        let reopened = Library::open(&path).unwrap();
        assert!(reopened.contains(id).unwrap());
        assert_eq!(reopened.path().unwrap(), path.as_path());
    }

    #[test]
    fn test_in_memory_catalog_has_no_path() {
        let library = Library::open_in_memory().unwrap();
        assert!(matches!(library.path(), Err(Error::InMemoryCatalog)));
    }

    #[test]
    fn test_broken_selection_table_reports_unavailable() {
        let (library, roll) = library_with_roll(&["a.nef"]);
        let id = library.enumerate(roll, 0, 1).unwrap()[0].id;
        library.conn.execute_batch("DROP TABLE selected_images").unwrap();

        assert!(matches!(library.toggle(id), Err(Error::SelectionUnavailable(_))));
        assert!(matches!(library.clear_all(), Err(Error::SelectionUnavailable(_))));
        assert!(matches!(library.contains(id), Err(Error::SelectionUnavailable(_))));
        assert!(matches!(library.all(), Err(Error::SelectionUnavailable(_))));
    }
}
