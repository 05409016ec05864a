//! Persistent state: conversations, extracted tasks and journal entries.
//!
//! The `Store` trait has an explicit load/save pair per entity. The
//! read-modify-write helpers built on top of it are not isolated; two
//! concurrent writers can lose an update.

pub mod json_file;

use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub use json_file::JsonFileStore;

/// Maximum number of conversations kept in the log.
pub const MAX_CONVERSATIONS: usize = 50;

/// Timestamp layout used in every store file (naive local time).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub user: String,
    pub assistant: String,
    pub timestamp: String,
    /// "voice" for transcribed interactions.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task: String,
    pub created: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: u64,
    pub entry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default)]
    pub ai_response: String,
    pub timestamp: String,
    #[serde(default)]
    pub date: String,
}

impl JournalEntry {
    /// Build entry number `id` written at `now`.
    pub fn new(id: u64, entry: &str, mood: &str, ai_response: &str, now: NaiveDateTime) -> Self {
        Self {
            id,
            entry: entry.to_string(),
            mood: Some(mood.to_string()),
            ai_response: ai_response.to_string(),
            timestamp: format_timestamp(now),
            date: now.format("%B %d, %Y").to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// On-disk document shapes
// ---------------------------------------------------------------------------

/// memory.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationLog {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

/// tasks.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// journal.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Journal {
    #[serde(default)]
    pub entries: Vec<JournalEntry>,
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Load/save contract for the three persisted entity types.
///
/// Loads never fail: unreadable state comes back as the empty default.
pub trait Store: Send + Sync {
    fn load_conversations(&self) -> Vec<Conversation>;
    fn save_conversations(&self, conversations: &[Conversation]) -> anyhow::Result<()>;

    fn load_tasks(&self) -> Vec<Task>;
    fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()>;

    fn load_journal(&self) -> Vec<JournalEntry>;
    fn save_journal(&self, entries: &[JournalEntry]) -> anyhow::Result<()>;

    /// Append a conversation, evicting the oldest beyond `MAX_CONVERSATIONS`.
    fn record_conversation(&self, conversation: Conversation) -> anyhow::Result<()> {
        let mut conversations = self.load_conversations();
        conversations.push(conversation);
        if conversations.len() > MAX_CONVERSATIONS {
            let excess = conversations.len() - MAX_CONVERSATIONS;
            conversations.drain(..excess);
        }
        self.save_conversations(&conversations)
    }

    /// The last `n` conversations, oldest first.
    fn recent_conversations(&self, n: usize) -> Vec<Conversation> {
        let conversations = self.load_conversations();
        let start = conversations.len().saturating_sub(n);
        conversations[start..].to_vec()
    }

    /// Append freshly extracted tasks, all stamped with `created`.
    fn append_tasks(&self, texts: &[String], created: &str) -> anyhow::Result<()> {
        if texts.is_empty() {
            return Ok(());
        }
        let mut tasks = self.load_tasks();
        tasks.extend(texts.iter().map(|text| Task {
            task: text.clone(),
            created: created.to_string(),
            completed: false,
        }));
        self.save_tasks(&tasks)
    }

    /// Mark the task at `index` completed. Returns `false` when out of range.
    fn complete_task(&self, index: usize) -> anyhow::Result<bool> {
        let mut tasks = self.load_tasks();
        match tasks.get_mut(index) {
            Some(task) => {
                task.completed = true;
                self.save_tasks(&tasks)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear_tasks(&self) -> anyhow::Result<()> {
        self.save_tasks(&[])
    }

    /// Create and persist a journal entry. The id is its 1-based position.
    fn add_journal_entry(
        &self,
        entry: &str,
        mood: &str,
        ai_response: &str,
        now: NaiveDateTime,
    ) -> anyhow::Result<JournalEntry> {
        let mut entries = self.load_journal();
        let new_entry = JournalEntry::new(entries.len() as u64 + 1, entry, mood, ai_response, now);
        entries.push(new_entry.clone());
        self.save_journal(&entries)?;
        Ok(new_entry)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    conversations: Vec<Conversation>,
    tasks: Vec<Task>,
    entries: Vec<JournalEntry>,
}

/// Process-local store with the same contract as the file store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Store for MemoryStore {
    fn load_conversations(&self) -> Vec<Conversation> {
        self.lock().conversations.clone()
    }

    fn save_conversations(&self, conversations: &[Conversation]) -> anyhow::Result<()> {
        self.lock().conversations = conversations.to_vec();
        Ok(())
    }

    fn load_tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        self.lock().tasks = tasks.to_vec();
        Ok(())
    }

    fn load_journal(&self) -> Vec<JournalEntry> {
        self.lock().entries.clone()
    }

    fn save_journal(&self, entries: &[JournalEntry]) -> anyhow::Result<()> {
        self.lock().entries = entries.to_vec();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Current local time in store format, e.g. `2025-03-04T09:15:00.123456`.
pub fn now_timestamp() -> String {
    format_timestamp(Local::now().naive_local())
}

pub fn format_timestamp(dt: NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp as naive local time.
///
/// Accepts the store's own layout (with or without fractional seconds) and
/// RFC 3339 strings, which are converted to local time.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
}
