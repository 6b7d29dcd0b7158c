use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use notepad_core::config::IdentitySource;
use notepad_core::identity::{
    DeviceIdentityProvider, FileSessionStore, IdentityProvider, SupabaseIdentityProvider,
};
use notepad_core::markup::plain_text;
use notepad_core::store::{NoteStore, SqliteNoteStore};
use notepad_core::{Note, NotepadConfig, Workspace};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub updated_at: Option<i64>,
    pub updated_at_iso: Option<String>,
    pub relative_time: String,
}

/// Load configuration and apply command-line overrides, which win over both
/// the config file and the environment.
pub fn resolve_config(
    config_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
    app_id: Option<String>,
) -> Result<NotepadConfig, CliError> {
    let mut config = NotepadConfig::load(config_path.as_deref())?;
    if let Some(db_path) = db_path {
        config.db_path = Some(db_path);
    }
    if let Some(app_id) = app_id {
        config.app_id = app_id;
    }
    config.validate()?;
    Ok(config)
}

pub fn open_store(config: &NotepadConfig) -> Result<Arc<SqliteNoteStore>, CliError> {
    let store = SqliteNoteStore::open(config.db_path())?.with_poll_interval(config.poll_interval());
    Ok(Arc::new(store))
}

pub fn identity_provider(config: &NotepadConfig) -> Result<Box<dyn IdentityProvider>, CliError> {
    let provider: Box<dyn IdentityProvider> = match config.identity_source()? {
        IdentitySource::Device => Box::new(DeviceIdentityProvider::new(config.identity_path())),
        IdentitySource::Supabase { url, anon_key } => Box::new(SupabaseIdentityProvider::new(
            url,
            anon_key,
            FileSessionStore::new(config.session_path()),
        )?),
    };
    Ok(provider)
}

/// Start a session against `store` and wait for the first snapshot.
pub async fn connect_workspace<S: NoteStore>(
    config: &NotepadConfig,
    store: Arc<S>,
) -> Result<Workspace<S>, CliError> {
    let provider = identity_provider(config)?;
    let mut workspace = Workspace::new(config.saved_indicator());
    workspace
        .connect(provider.as_ref(), store, &config.app_id)
        .await?;

    while workspace.is_loading() {
        if !workspace.process_next_snapshot().await {
            break;
        }
    }
    Ok(workspace)
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Find a note by exact id or unique id prefix.
pub fn resolve_note<'a>(notes: &'a [Note], query: &str) -> Result<&'a Note, CliError> {
    let query = normalize_note_identifier(query)?;

    if let Some(note) = notes
        .iter()
        .find(|note| note.id.as_ref().is_some_and(|id| id.as_str() == query))
    {
        return Ok(note);
    }

    let matching = notes
        .iter()
        .filter(|note| {
            note.id
                .as_ref()
                .is_some_and(|id| id.as_str().starts_with(&query))
        })
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::NoteNotFound(query)),
        [note] => Ok(note),
        candidates => {
            let options = candidates
                .iter()
                .take(3)
                .filter_map(|note| note.id.as_ref().map(ToString::to_string))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousNoteId(format!(
                "Note ID prefix '{query}' is ambiguous. Matches: {options}"
            )))
        }
    }
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let text = plain_text(&note.content);
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn note_to_list_item(note: &Note, now_ms: i64) -> NoteListItem {
    NoteListItem {
        id: note.id.as_ref().map(ToString::to_string).unwrap_or_default(),
        title: note.title.clone(),
        preview: note_preview(note, 80),
        updated_at: note.updated_at,
        updated_at_iso: note
            .updated_at
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|timestamp| timestamp.to_rfc3339()),
        relative_time: note
            .updated_at
            .map_or_else(|| "pending".to_string(), |ts| format_relative_time(ts, now_ms)),
    }
}

/// One line per note: short id, age and title. The active note is starred.
pub fn format_note_lines(notes: &[Note], active: Option<&Note>, now_ms: i64) -> Vec<String> {
    notes
        .iter()
        .map(|note| {
            let marker = if active.is_some_and(|active| active.id.is_some() && active.id == note.id)
            {
                '*'
            } else {
                ' '
            };
            let id = note.id.as_ref().map(ToString::to_string).unwrap_or_default();
            let short_id = id.chars().take(8).collect::<String>();
            let age = note
                .updated_at
                .map_or_else(|| "pending".to_string(), |ts| format_relative_time(ts, now_ms));
            format!("{marker} {short_id}  {age:>9}  {}", note.title)
        })
        .collect()
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
