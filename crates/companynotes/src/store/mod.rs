//! Note store for companynotes.
//!
//! [`NoteStore`] owns the ownership and visibility rules and delegates
//! persistence to a [`NoteBackend`]. Company reference data comes from an
//! optional [`CompanyDirectory`]; only the hosted backend provides one.
//!
//! The backend is chosen once at startup by [`ResolvedBackend::resolve`] and
//! never revisited.

pub mod file;
pub mod memory;

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{BackendKind, Config};
use crate::error::{Error, Result};
use crate::hosted::HostedBackend;
use crate::model::{Company, CreateNote, Note, UpdateNote};

pub use file::FileBackend;
pub use memory::{MemoryBackend, MemoryCompanies};

/// Persistence for notes.
///
/// Implementations store and fetch records verbatim; they never apply
/// ownership or visibility rules.
#[async_trait]
pub trait NoteBackend: Send + Sync + Debug {
    /// Short backend name for logs and status output.
    fn name(&self) -> &'static str;

    /// All notes attached to `company_id`, in backend order.
    async fn notes_for_company(&self, company_id: i64) -> Result<Vec<Note>>;

    /// The note with the given id, if any.
    async fn get_note(&self, id: &str) -> Result<Option<Note>>;

    /// Persist a new note.
    async fn insert_note(&self, note: &Note) -> Result<()>;

    /// Overwrite the stored note that has the same id.
    async fn replace_note(&self, note: &Note) -> Result<()>;

    /// Remove a note. Returns `false` if it did not exist.
    async fn remove_note(&self, id: &str) -> Result<bool>;
}

/// Read access to company reference data.
#[async_trait]
pub trait CompanyDirectory: Send + Sync + Debug {
    /// Every company.
    async fn list_companies(&self) -> Result<Vec<Company>>;

    /// The company with the given id, if any.
    async fn find_company(&self, id: i64) -> Result<Option<Company>>;
}

/// The storage chosen at startup.
#[derive(Debug, Clone)]
pub struct ResolvedBackend {
    notes: Arc<dyn NoteBackend>,
    companies: Option<Arc<dyn CompanyDirectory>>,
}

impl ResolvedBackend {
    /// Notes in a local JSON file; no company directory.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            notes: Arc::new(FileBackend::new(path)),
            companies: None,
        }
    }

    /// Notes and companies in the hosted document database.
    #[must_use]
    pub fn hosted(backend: HostedBackend) -> Self {
        Self {
            notes: Arc::new(backend.clone()),
            companies: Some(Arc::new(backend)),
        }
    }

    /// Arbitrary parts, mainly for tests.
    #[must_use]
    pub fn from_parts(
        notes: Arc<dyn NoteBackend>,
        companies: Option<Arc<dyn CompanyDirectory>>,
    ) -> Self {
        Self { notes, companies }
    }

    /// Pick the backend described by `config`.
    ///
    /// In `auto` mode the hosted backend is used only when credentials are
    /// present and a connectivity probe succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error in `hosted` mode if the hosted backend cannot be
    /// built or reached.
    pub async fn resolve(config: &Config) -> Result<Self> {
        let notes_path = config.notes_path();

        match config.storage.backend {
            BackendKind::File => {
                info!("Using local notes file at {}", notes_path.display());
                Ok(Self::file(notes_path))
            }
            BackendKind::Hosted => {
                let backend = HostedBackend::from_config(&config.hosted)?
                    .ok_or_else(|| Error::not_configured("hosted document backend"))?;
                backend.probe().await?;
                info!("Using hosted document backend at {}", backend.base_url());
                Ok(Self::hosted(backend))
            }
            BackendKind::Auto => {
                let Some(backend) = HostedBackend::from_config(&config.hosted)? else {
                    info!(
                        "No hosted credentials configured; using local notes file at {}",
                        notes_path.display()
                    );
                    return Ok(Self::file(notes_path));
                };

                match backend.probe().await {
                    Ok(()) => {
                        info!("Using hosted document backend at {}", backend.base_url());
                        Ok(Self::hosted(backend))
                    }
                    Err(e) => {
                        warn!(
                            "Hosted backend unreachable ({}); using local notes file at {}",
                            e,
                            notes_path.display()
                        );
                        Ok(Self::file(notes_path))
                    }
                }
            }
        }
    }

    /// Name of the note backend.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.notes.name()
    }
}

/// Notes with ownership and visibility enforcement.
#[derive(Debug, Clone)]
pub struct NoteStore {
    notes: Arc<dyn NoteBackend>,
    companies: Option<Arc<dyn CompanyDirectory>>,
}

impl NoteStore {
    /// Create a store over the resolved backend.
    #[must_use]
    pub fn new(backend: ResolvedBackend) -> Self {
        Self {
            notes: backend.notes,
            companies: backend.companies,
        }
    }

    /// Name of the note backend in use.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.notes.name()
    }

    fn directory(&self) -> Result<&dyn CompanyDirectory> {
        self.companies
            .as_deref()
            .ok_or_else(|| Error::not_configured("company directory"))
    }

    /// List every company.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] when no company directory exists, or
    /// a backend error.
    pub async fn list_companies(&self) -> Result<Vec<Company>> {
        self.directory()?.list_companies().await
    }

    /// Look up a company. A missing company is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] when no company directory exists, or
    /// a backend error.
    pub async fn get_company_by_id(&self, id: i64) -> Result<Option<Company>> {
        self.directory()?.find_company(id).await
    }

    /// Notes on a company that `requester` may see.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn list_notes_for_company(
        &self,
        company_id: i64,
        requester: Option<&str>,
    ) -> Result<Vec<Note>> {
        let notes = self.notes.notes_for_company(company_id).await?;
        Ok(notes
            .into_iter()
            .filter(|note| note.company_id == company_id && note.is_visible_to(requester))
            .collect())
    }

    /// Create a note owned by `requester`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationRequired`] without a requester, or a
    /// backend error. Nothing is persisted on failure.
    pub async fn create_note(&self, input: CreateNote, requester: Option<&str>) -> Result<Note> {
        let owner = requester
            .filter(|id| !id.is_empty())
            .ok_or(Error::AuthenticationRequired)?;

        let note = Note::new(input, owner);
        self.notes.insert_note(&note).await?;
        debug!("Created note {} on company {}", note.id, note.company_id);
        Ok(note)
    }

    /// Change a note's content and/or privacy flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id, [`Error::NotAuthorized`]
    /// unless `requester` owns the note, or a backend error.
    pub async fn update_note(
        &self,
        id: &str,
        updates: UpdateNote,
        requester: Option<&str>,
    ) -> Result<Note> {
        let mut note = self.owned_note(id, requester, "edit").await?;
        note.apply(updates);
        self.notes.replace_note(&note).await?;
        debug!("Updated note {}", note.id);
        Ok(note)
    }

    /// Permanently delete a note.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id, [`Error::NotAuthorized`]
    /// unless `requester` owns the note, or a backend error.
    pub async fn delete_note(&self, id: &str, requester: Option<&str>) -> Result<()> {
        self.owned_note(id, requester, "delete").await?;
        if !self.notes.remove_note(id).await? {
            // Deleted by someone else between the lookup and the removal.
            return Err(Error::note_not_found(id));
        }
        debug!("Deleted note {}", id);
        Ok(())
    }

    async fn owned_note(
        &self,
        id: &str,
        requester: Option<&str>,
        action: &'static str,
    ) -> Result<Note> {
        let note = self
            .notes
            .get_note(id)
            .await?
            .ok_or_else(|| Error::note_not_found(id))?;

        if !note.is_owned_by(requester) {
            return Err(Error::not_authorized(action));
        }
        Ok(note)
    }
}
