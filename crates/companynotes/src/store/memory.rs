//! In-memory backends.
//!
//! Used as fakes in tests and for running the server without any storage.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CompanyDirectory, NoteBackend};
use crate::error::{Error, Result};
use crate::model::{Company, Note};

/// Notes held in a vector, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    notes: RwLock<Vec<Note>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-filled with `notes`.
    #[must_use]
    pub fn with_notes(notes: Vec<Note>) -> Self {
        Self {
            notes: RwLock::new(notes),
        }
    }

    /// Number of stored notes, regardless of company or visibility.
    pub async fn len(&self) -> usize {
        self.notes.read().await.len()
    }

    /// Whether no notes are stored.
    pub async fn is_empty(&self) -> bool {
        self.notes.read().await.is_empty()
    }
}

#[async_trait]
impl NoteBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn notes_for_company(&self, company_id: i64) -> Result<Vec<Note>> {
        Ok(self
            .notes
            .read()
            .await
            .iter()
            .filter(|note| note.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn get_note(&self, id: &str) -> Result<Option<Note>> {
        Ok(self
            .notes
            .read()
            .await
            .iter()
            .find(|note| note.id == id)
            .cloned())
    }

    async fn insert_note(&self, note: &Note) -> Result<()> {
        self.notes.write().await.push(note.clone());
        Ok(())
    }

    async fn replace_note(&self, note: &Note) -> Result<()> {
        let mut notes = self.notes.write().await;
        let slot = notes
            .iter_mut()
            .find(|existing| existing.id == note.id)
            .ok_or_else(|| Error::note_not_found(&note.id))?;
        *slot = note.clone();
        Ok(())
    }

    async fn remove_note(&self, id: &str) -> Result<bool> {
        let mut notes = self.notes.write().await;
        let before = notes.len();
        notes.retain(|note| note.id != id);
        Ok(notes.len() != before)
    }
}

/// A fixed list of companies.
#[derive(Debug, Default, Clone)]
pub struct MemoryCompanies {
    companies: Vec<Company>,
}

impl MemoryCompanies {
    /// Create a directory holding `companies`.
    #[must_use]
    pub fn new(companies: Vec<Company>) -> Self {
        Self { companies }
    }
}

#[async_trait]
impl CompanyDirectory for MemoryCompanies {
    async fn list_companies(&self) -> Result<Vec<Company>> {
        Ok(self.companies.clone())
    }

    async fn find_company(&self, id: i64) -> Result<Option<Company>> {
        Ok(self.companies.iter().find(|c| c.id == id).cloned())
    }
}
