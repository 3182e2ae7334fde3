use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::data::ImageEntry;
use super::tags;
use crate::error::{Error, Result, ValidationIssue};

const SELECT_ENTRY: &str =
    "SELECT id, title, description, tags, filepath, timestamp FROM image_metadata";

/// The Library manages the SQLite metadata store.
/// It stores one row per labelled photo: title, description, tags and the
/// path of the working image file.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
}

impl Library {
    /// Open (or create) the database at `db_path` and initialize the schema.
    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;

        info!("📁 Database initialized at: {}", db_path.display());

        let library = Library {
            conn,
            db_path: db_path.to_path_buf(),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Open a throwaway database that lives only as long as the connection
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let library = Library {
            conn,
            db_path: PathBuf::from(":memory:"),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Initialize the database schema.
    /// Creates the table and indexes if they don't exist.
    fn init_schema(&self) -> Result<()> {
        // AUTOINCREMENT keeps ids from being reused after deletes
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS image_metadata (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                tags            TEXT NOT NULL DEFAULT '',
                filepath        TEXT NOT NULL,
                timestamp       INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_image_metadata_filepath
             ON image_metadata(filepath)",
            [],
        )?;

        debug!("✅ Database schema initialized");

        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Get a count of entries in the library
    pub fn entry_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM image_metadata", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Insert a new entry and return it as stored
    pub fn create<S: AsRef<str>>(
        &self,
        title: &str,
        description: &str,
        filepath: &Path,
        tags: &[S],
    ) -> Result<ImageEntry> {
        let mut issues = Vec::new();
        if title.trim().is_empty() {
            issues.push(ValidationIssue::TitleRequired);
        }
        // Stored as TEXT, so the path must read back exactly as written
        let stored_path = filepath.to_str();
        if filepath.as_os_str().is_empty() {
            issues.push(ValidationIssue::FilepathRequired);
        } else if stored_path.is_none() {
            issues.push(ValidationIssue::FilepathNotUnicode(filepath.to_path_buf()));
        }
        let stored_path = match stored_path {
            Some(path) if issues.is_empty() => path,
            _ => return Err(Error::Validation(issues)),
        };
        let encoded_tags = tags::encode(tags)?;

        let now = Utc::now().timestamp_micros();

        self.conn.execute(
            "INSERT INTO image_metadata (title, description, tags, filepath, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                title,
                description,
                encoded_tags,
                stored_path,
                now,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        info!("🏷️  Image metadata for '{}' added as #{}", title, id);

        self.get_by_id(id)
    }

    /// Get all entries, oldest first
    pub fn get_all(&self) -> Result<Vec<ImageEntry>> {
        let mut stmt = self.conn.prepare(&format!("{SELECT_ENTRY} ORDER BY id ASC"))?;

        let entry_iter = stmt.query_map([], entry_from_row)?;

        let mut entries = Vec::new();
        for entry in entry_iter {
            entries.push(entry?);
        }

        Ok(entries)
    }

    /// Get one entry by id
    pub fn get_by_id(&self, id: i64) -> Result<ImageEntry> {
        self.conn
            .query_row(&format!("{SELECT_ENTRY} WHERE id = ?1"), params![id], entry_from_row)
            .optional()?
            .ok_or(Error::NotFound { id })
    }

    /// Replace title, description and tags. Filepath and timestamp stay as they are.
    pub fn update<S: AsRef<str>>(
        &self,
        id: i64,
        title: &str,
        description: &str,
        tags: &[S],
    ) -> Result<ImageEntry> {
        if title.trim().is_empty() {
            return Err(Error::invalid(ValidationIssue::TitleRequired));
        }
        let encoded_tags = tags::encode(tags)?;

        let changed = self.conn.execute(
            "UPDATE image_metadata SET title = ?1, description = ?2, tags = ?3 WHERE id = ?4",
            params![title, description, encoded_tags, id],
        )?;

        if changed == 0 {
            return Err(Error::NotFound { id });
        }

        debug!("💾 Updated metadata for #{}", id);
        self.get_by_id(id)
    }

    /// Remove an entry. The image file on disk is left alone.
    pub fn delete(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM image_metadata WHERE id = ?1", params![id])?;

        if changed == 0 {
            return Err(Error::NotFound { id });
        }

        info!("🗑️  Deleted entry #{}", id);
        Ok(())
    }

    /// Every working file path referenced by a record
    pub fn referenced_filepaths(&self) -> Result<Vec<PathBuf>> {
        let mut stmt = self.conn.prepare("SELECT filepath FROM image_metadata")?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(paths.into_iter().map(PathBuf::from).collect())
    }

    /// Verify that working files still exist on disk.
    /// Returns the entries whose file is missing.
    pub fn missing_files(&self) -> Result<Vec<ImageEntry>> {
        let missing: Vec<ImageEntry> = self
            .get_all()?
            .into_iter()
            .filter(|entry| !entry.file_exists())
            .collect();

        if !missing.is_empty() {
            warn!("⚠️  {} entries point at missing files", missing.len());
        }

        Ok(missing)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<ImageEntry> {
    let encoded_tags: String = row.get(3)?;
    let filepath: String = row.get(4)?;
    let micros: i64 = row.get(5)?;

    let timestamp = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(5, micros)
    })?;

    Ok(ImageEntry {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        tags: tags::decode(&encoded_tags),
        filepath: PathBuf::from(filepath),
        timestamp,
    })
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

    fn library() -> Library {
        Library::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_then_get_by_id() {
        let library = library();
        let created = library
            .create("Desk", "My desk", Path::new("img/desk.png"), &["Webcam"])
            .unwrap();

        let fetched = library.get_by_id(created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.title, "Desk");
        assert_eq!(fetched.description, "My desk");
        assert_eq!(fetched.tags, vec!["Webcam"]);
        assert_eq!(fetched.filepath, PathBuf::from("img/desk.png"));
    }

    #[test]
    fn test_create_reports_every_missing_field() {
        let library = library();
        match library.create::<&str>(" ", "", Path::new(""), &[]) {
            Err(Error::Validation(issues)) => assert_eq!(
                issues,
                vec![ValidationIssue::TitleRequired, ValidationIssue::FilepathRequired]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(library.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_get_all_is_in_insertion_order() {
        let library = library();
        for title in ["a", "b", "c"] {
            library
                .create::<&str>(title, "", Path::new(&format!("{title}.png")), &[])
                .unwrap();
        }

        let titles: Vec<String> = library.get_all().unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert_eq!(library.entry_count().unwrap(), 3);
    }

    #[test]
    fn test_update_keeps_filepath_and_timestamp() {
        let library = library();
        let created = library
            .create("Old", "Desc", Path::new("one.png"), &["x"])
            .unwrap();

        let updated = library
            .update(created.id, "New", "Desc2", &["a", "b"])
            .unwrap();

        let fetched = library.get_by_id(created.id).unwrap();
        assert_eq!(updated, fetched);
        assert_eq!(fetched.title, "New");
        assert_eq!(fetched.description, "Desc2");
        assert_eq!(fetched.tags, vec!["a", "b"]);
        assert_eq!(fetched.filepath, created.filepath);
        assert_eq!(fetched.timestamp, created.timestamp);
    }

    #[test]
    fn test_update_unknown_id_leaves_others_untouched() {
        let library = library();
        let kept = library.create("Keep", "me", Path::new("keep.png"), &["t"]).unwrap();

        let err = library.update(999, "x", "y", &["z"]).unwrap_err();
        assert!(matches!(err, Error::NotFound { id: 999 }));
        assert_eq!(library.get_all().unwrap(), vec![kept]);
    }

    #[test]
    fn test_delete_then_get_is_not_found() {
        let library = library();
        let created = library.create::<&str>("Gone", "", Path::new("gone.png"), &[]).unwrap();

        library.delete(created.id).unwrap();

        assert!(matches!(library.get_by_id(created.id), Err(Error::NotFound { .. })));
        assert!(matches!(library.delete(created.id), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let library = library();
        let first = library.create::<&str>("one", "", Path::new("1.png"), &[]).unwrap();
        library.delete(first.id).unwrap();
        let second = library.create::<&str>("two", "", Path::new("2.png"), &[]).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_create_rejects_empty_title_and_bad_tags() {
        let library = library();
        assert!(matches!(
            library.create::<&str>("  ", "", Path::new("x.png"), &[]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            library.create("ok", "", Path::new("x.png"), &["a,b"]),
            Err(Error::Validation(_))
        ));
        assert_eq!(library.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("image_metadata.db");

        let id = {
            let library = Library::open(&db_path).unwrap();
            library.create("Persist", "d", Path::new("p.png"), &["k"]).unwrap().id
        };

        let reopened = Library::open(&db_path).unwrap();
        assert_eq!(reopened.get_by_id(id).unwrap().title, "Persist");
        assert_eq!(reopened.path(), db_path.as_path());
    }

    #[test]
    fn test_missing_files_reports_dangling_records() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.png");
        std::fs::write(&present, b"x").unwrap();

        let library = library();
        library.create::<&str>("here", "", &present, &[]).unwrap();
        let gone = library
            .create::<&str>("gone", "", &dir.path().join("absent.png"), &[])
            .unwrap();

        let missing = library.missing_files().unwrap();
        assert_eq!(missing, vec![gone]);
        assert_eq!(library.referenced_filepaths().unwrap().len(), 2);
    }
}
