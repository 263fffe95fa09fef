//! Local JSON-file note backend.
//!
//! The whole note set lives in one pretty-printed JSON array. Every operation
//! reads the entire file and every mutation rewrites it. There is no locking:
//! two concurrent mutations that both read before either writes lose one of
//! the changes, so this backend is meant for single-user and development use.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use super::NoteBackend;
use crate::error::{Error, Result};
use crate::model::Note;

/// Notes stored in a single JSON file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend for the file at `path`. Nothing is touched until first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path to the notes file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every note, creating an empty file if none exists yet.
    async fn load(&self) -> Result<Vec<Note>> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| Error::MalformedFile {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Creating notes file at {}", self.path.display());
                self.save(&[]).await?;
                Ok(Vec::new())
            }
            Err(source) => Err(Error::FileRead {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Rewrite the whole file with `notes`.
    async fn save(&self, notes: &[Note]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| Error::DirectoryCreate {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let json = serde_json::to_string_pretty(notes)?;
        fs::write(&self.path, json)
            .await
            .map_err(|source| Error::FileWrite {
                path: self.path.clone(),
                source,
            })?;
        debug!("Wrote {} notes to {}", notes.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl NoteBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn notes_for_company(&self, company_id: i64) -> Result<Vec<Note>> {
        let mut notes = self.load().await?;
        notes.retain(|note| note.company_id == company_id);
        Ok(notes)
    }

    async fn get_note(&self, id: &str) -> Result<Option<Note>> {
        Ok(self.load().await?.into_iter().find(|note| note.id == id))
    }

    async fn insert_note(&self, note: &Note) -> Result<()> {
        let mut notes = self.load().await?;
        notes.push(note.clone());
        self.save(&notes).await
    }

    async fn replace_note(&self, note: &Note) -> Result<()> {
        let mut notes = self.load().await?;
        let slot = notes
            .iter_mut()
            .find(|existing| existing.id == note.id)
            .ok_or_else(|| Error::note_not_found(&note.id))?;
        *slot = note.clone();
        self.save(&notes).await
    }

    async fn remove_note(&self, id: &str) -> Result<bool> {
        let mut notes = self.load().await?;
        let before = notes.len();
        notes.retain(|note| note.id != id);
        if notes.len() == before {
            return Ok(false);
        }
        self.save(&notes).await?;
        Ok(true)
    }
}
