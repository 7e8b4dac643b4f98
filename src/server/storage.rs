//! Server-side document storage.
//!
//! Each document is a JSON file:
//! ```text
//! <DATA_DIR>/
//!   <collection>/
//!     <id>.json
//! ```
//!
//! Collections are a closed set and ids are UUIDs, so no request can name a
//! path outside the data directory.

use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tourney_core::Collection;
use uuid::Uuid;

/// Errors that can occur during server storage operations.
#[derive(Debug)]
pub enum ServerStorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// A stored file is not valid JSON.
    CorruptDocument(PathBuf, serde_json::Error),
}

impl std::fmt::Display for ServerStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            ServerStorageError::CorruptDocument(path, e) => {
                write!(f, "Failed to parse document {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ServerStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerStorageError::IoError(_, e) => Some(e),
            ServerStorageError::CorruptDocument(_, e) => Some(e),
        }
    }
}

/// JSON documents on disk, one file per record.
#[derive(Debug, Clone)]
pub struct ServerStorage {
    data_dir: PathBuf,
}

impl ServerStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.name())
    }

    fn doc_path(&self, collection: Collection, id: Uuid) -> PathBuf {
        self.collection_dir(collection).join(format!("{}.json", id))
    }

    /// Loads a document. Returns `Ok(None)` if it doesn't exist.
    pub fn get(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Value>, ServerStorageError> {
        let path = self.doc_path(collection, id);
        read_document(&path)
    }

    /// All documents of a collection, ordered by id.
    pub fn list(&self, collection: Collection) -> Result<Vec<(Uuid, Value)>, ServerStorageError> {
        let dir = self.collection_dir(collection);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ServerStorageError::IoError(dir, e)),
        };

        let mut documents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ServerStorageError::IoError(dir.clone(), e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // Leftover temp files and foreign files are not documents.
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                continue;
            };
            if let Some(doc) = read_document(&path)? {
                documents.push((id, doc));
            }
        }
        documents.sort_by_key(|(id, _)| *id);
        Ok(documents)
    }

    /// Writes a document, replacing any previous version.
    ///
    /// Creates the collection directory if it doesn't exist.
    pub fn put(
        &self,
        collection: Collection,
        id: Uuid,
        doc: &Value,
    ) -> Result<(), ServerStorageError> {
        let dir = self.collection_dir(collection);
        let path = self.doc_path(collection, id);

        fs::create_dir_all(&dir).map_err(|e| ServerStorageError::IoError(dir.clone(), e))?;

        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| ServerStorageError::CorruptDocument(path.clone(), e))?;

        // Write atomically using temp file + rename. Concurrent writers of the
        // same id each get their own temp file; the last rename wins.
        let temp_path = dir.join(format!("{}.{}.tmp", id, Uuid::new_v4()));

        let mut file = File::create(&temp_path)
            .map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;
        file.write_all(&bytes)
            .map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;
        file.sync_all()
            .map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;

        fs::rename(&temp_path, &path).map_err(|e| ServerStorageError::IoError(path, e))?;

        Ok(())
    }

    /// Removes a document. Returns whether it existed.
    pub fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, ServerStorageError> {
        let path = self.doc_path(collection, id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServerStorageError::IoError(path, e)),
        }
    }
}

fn read_document(path: &Path) -> Result<Option<Value>, ServerStorageError> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ServerStorageError::CorruptDocument(path.to_path_buf(), e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ServerStorageError::IoError(path.to_path_buf(), e)),
    }
}
