//! Flat-file JSON store.
//!
//! Three documents live side by side in the data directory:
//! ```json
//! memory.json   {"conversations": [...]}
//! tasks.json    {"tasks": [...]}
//! journal.json  {"entries": [...]}
//! ```
//! A missing or unparsable document is replaced by its empty default and
//! rewritten. Whatever it held before is lost.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Conversation, ConversationLog, Journal, JournalEntry, Store, Task, TaskList};

pub struct JsonFileStore {
    memory_path: PathBuf,
    tasks_path: PathBuf,
    journal_path: PathBuf,
}

impl JsonFileStore {
    /// Open a store over the three given files, creating any that are missing.
    pub fn open(memory_path: PathBuf, tasks_path: PathBuf, journal_path: PathBuf) -> Self {
        let store = Self {
            memory_path,
            tasks_path,
            journal_path,
        };
        store.init_files();
        store
    }

    /// Open a store using the standard file names inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::open(
            data_dir.join("memory.json"),
            data_dir.join("tasks.json"),
            data_dir.join("journal.json"),
        )
    }

    fn init_files(&self) {
        init_document::<ConversationLog>(&self.memory_path);
        init_document::<TaskList>(&self.tasks_path);
        init_document::<Journal>(&self.journal_path);
    }
}

impl Store for JsonFileStore {
    fn load_conversations(&self) -> Vec<Conversation> {
        load_document::<ConversationLog>(&self.memory_path).conversations
    }

    fn save_conversations(&self, conversations: &[Conversation]) -> anyhow::Result<()> {
        save_document(
            &self.memory_path,
            &ConversationLog {
                conversations: conversations.to_vec(),
            },
        )
    }

    fn load_tasks(&self) -> Vec<Task> {
        load_document::<TaskList>(&self.tasks_path).tasks
    }

    fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_document(
            &self.tasks_path,
            &TaskList {
                tasks: tasks.to_vec(),
            },
        )
    }

    fn load_journal(&self) -> Vec<JournalEntry> {
        load_document::<Journal>(&self.journal_path).entries
    }

    fn save_journal(&self, entries: &[JournalEntry]) -> anyhow::Result<()> {
        save_document(
            &self.journal_path,
            &Journal {
                entries: entries.to_vec(),
            },
        )
    }
}

// -- internal helpers --

fn init_document<T: Default + Serialize>(path: &Path) {
    if path.exists() {
        return;
    }
    if let Err(e) = save_document(path, &T::default()) {
        warn!("Failed to create {}: {}", path.display(), e);
    }
}

/// Read a document, repairing it to the default shape when it can't be parsed.
fn load_document<T>(path: &Path) -> T
where
    T: Default + Serialize + DeserializeOwned,
{
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            if contents.trim().is_empty() {
                return T::default();
            }
            match serde_json::from_str(&contents) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Fixing {} ({})", path.display(), e);
                    repair(path)
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Fixing {} (missing)", path.display());
            repair(path)
        }
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            T::default()
        }
    }
}

fn repair<T: Default + Serialize>(path: &Path) -> T {
    let default = T::default();
    if let Err(e) = save_document(path, &default) {
        warn!("Failed to rewrite {}: {}", path.display(), e);
    }
    default
}

/// Atomic write: write to a temp file in the same directory, then rename.
fn save_document<T: Serialize>(path: &Path, doc: &T) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "store".to_string());
    // Unique per write: concurrent requests save the same document.
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    let json = serde_json::to_string_pretty(doc)?;
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;
    debug!(path = %path.display(), bytes = json.len(), "Saved store document");
    Ok(())
}
