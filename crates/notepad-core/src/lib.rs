//! notepad-core - Core library for Notepad
//!
//! This crate contains the note models, the note lifecycle controller, the
//! store and identity abstractions with their implementations, and the export
//! helpers used by the Notepad terminal shell.

pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod identity;
pub mod markup;
pub mod models;
pub mod session;
pub mod store;
pub mod util;
pub mod workspace;

pub use config::NotepadConfig;
pub use controller::NoteController;
pub use error::{Error, Result};
pub use models::{Note, NoteId, NotePatch, Snapshot};
pub use session::SessionContext;
pub use workspace::{DeleteOutcome, SaveOutcome, Workspace};
