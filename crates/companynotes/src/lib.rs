//! `companynotes` - A company directory with owner-scoped notes
//!
//! This library provides the note store with its ownership and visibility
//! rules, two interchangeable storage backends (a local JSON file and a
//! hosted document database), caller identity resolution, AI company
//! summaries and the HTTP API that ties them together.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod hosted;
pub mod identity;
pub mod logging;
pub mod model;
pub mod server;
pub mod store;
pub mod summary;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{Company, CreateNote, Note, UpdateNote};
pub use store::{NoteStore, ResolvedBackend};
