//! Request orchestration: prompt, completion, persistence and speech.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::journal::{self, WeeklySummary};
use crate::llm::{ProviderClient, ProviderKind};
use crate::prompts::{system_prompt, Mode, CONTEXT_CONVERSATIONS};
use crate::store::{now_timestamp, Conversation, JournalEntry, Store, Task};
use crate::stt::SttAdapter;
use crate::tts::{Emotion, SpeechSynthesizer};

/// Mood recorded when a journal entry arrives without one.
pub const DEFAULT_MOOD: &str = "neutral";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub audio_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceReply {
    pub transcription: String,
    pub response: String,
    pub audio_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalReply {
    #[serde(flatten)]
    pub entry: JournalEntry,
    pub audio_available: bool,
}

pub struct Assistant {
    store: Arc<dyn Store>,
    llm: ProviderClient,
    tts: SpeechSynthesizer,
    stt: Option<SttAdapter>,
    upload_dir: PathBuf,
}

impl Assistant {
    /// `upload_dir` holds voice uploads while they are transcribed.
    pub fn new(
        store: Arc<dyn Store>,
        llm: ProviderClient,
        tts: SpeechSynthesizer,
        stt: Option<SttAdapter>,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            llm,
            tts,
            stt,
            upload_dir,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.llm.active()
    }

    /// Where rendered speech is written.
    pub fn audio_path(&self) -> &Path {
        self.tts.output_path()
    }

    // -- conversation --

    /// Reply to a typed message in planning mode and speak it.
    pub async fn chat(&self, message: &str, emotion: Emotion) -> ChatReply {
        info!(chars = message.len(), emotion = %emotion, "Chat message");
        let response = self.ask(message, Mode::Planning).await;
        self.remember(message, &response, None);
        let audio_available = self.speak(&response, emotion).await;
        ChatReply {
            response,
            audio_available,
        }
    }

    /// Transcribe an uploaded recording, then answer it like a chat message.
    pub async fn voice(&self, audio: &[u8], file_name: Option<&str>) -> anyhow::Result<VoiceReply> {
        let transcription = self.transcribe_upload(audio, file_name).await?;
        info!(chars = transcription.len(), "Voice message transcribed");

        let response = self.ask(&transcription, Mode::Planning).await;
        self.remember(&transcription, &response, Some("voice"));
        let audio_available = self.speak(&response, Emotion::Friendly).await;
        Ok(VoiceReply {
            transcription,
            response,
            audio_available,
        })
    }

    async fn transcribe_upload(&self, audio: &[u8], file_name: Option<&str>) -> anyhow::Result<String> {
        let stt = self
            .stt
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Speech recognition is not configured"))?;

        let ext = file_name
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .unwrap_or("wav");
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let tmp = self.upload_dir.join(format!("upload-{}.{}", Uuid::new_v4(), ext));
        tokio::fs::write(&tmp, audio)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to save upload: {}", e))?;

        let result = stt.transcribe(&tmp).await;
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            warn!(path = %tmp.display(), "Failed to remove upload: {}", e);
        }
        result
    }

    async fn ask(&self, message: &str, mode: Mode) -> String {
        let recent = self.store.recent_conversations(CONTEXT_CONVERSATIONS);
        let system = system_prompt(mode, &recent, Local::now().naive_local());
        self.llm.complete(&system, message).await
    }

    async fn speak(&self, text: &str, emotion: Emotion) -> bool {
        self.tts.synthesize(text, emotion).await.is_some()
    }

    fn remember(&self, user: &str, assistant: &str, kind: Option<&str>) {
        let conversation = Conversation {
            user: user.to_string(),
            assistant: assistant.to_string(),
            timestamp: now_timestamp(),
            kind: kind.map(|k| k.to_string()),
        };
        if let Err(e) = self.store.record_conversation(conversation) {
            warn!("Failed to save conversation: {}", e);
        }
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.store.load_conversations()
    }

    // -- tasks --

    pub fn tasks(&self) -> Vec<Task> {
        self.store.load_tasks()
    }

    /// Mark a task done. `false` when `index` is out of range.
    pub fn complete_task(&self, index: usize) -> bool {
        match self.store.complete_task(index) {
            Ok(found) => found,
            Err(e) => {
                warn!(index, "Failed to save completed task: {}", e);
                true
            }
        }
    }

    pub fn clear_tasks(&self) {
        if let Err(e) = self.store.clear_tasks() {
            warn!("Failed to clear tasks: {}", e);
        }
    }

    // -- journal --

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.store.load_journal()
    }

    /// Record an entry with an empathetic reply. A blank mood is "neutral".
    pub async fn add_journal_entry(&self, entry: &str, mood: Option<&str>) -> JournalReply {
        let mood = mood
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MOOD);
        let ai_response = self.ask(&journal::entry_prompt(entry, mood), Mode::Journaling).await;

        let now = Local::now().naive_local();
        let entry = match self.store.add_journal_entry(entry, mood, &ai_response, now) {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Failed to save journal entry: {}", e);
                let id = self.store.load_journal().len() as u64 + 1;
                JournalEntry::new(id, entry, mood, &ai_response, now)
            }
        };
        info!(id = entry.id, mood = %mood, "Journal entry added");

        let audio_available = self.speak(&entry.ai_response, Emotion::Empathetic).await;
        JournalReply {
            entry,
            audio_available,
        }
    }

    pub fn journal_prompts(&self) -> Vec<&'static str> {
        journal::daily_prompts(Local::now().naive_local())
    }

    pub fn search_journal(&self, query: &str) -> Vec<JournalEntry> {
        let entries = self.store.load_journal();
        journal::search(&entries, query).into_iter().cloned().collect()
    }

    pub async fn weekly_summary(&self) -> WeeklySummary {
        self.weekly_summary_at(Local::now().naive_local()).await
    }

    /// Digest of the 7 days before `now`.
    pub async fn weekly_summary_at(&self, now: NaiveDateTime) -> WeeklySummary {
        let entries = self.store.load_journal();
        let recent = journal::qualifying_entries(&entries, now);
        if recent.is_empty() {
            return WeeklySummary::empty();
        }

        let stats = journal::weekly_stats(&recent);
        let prompt = journal::build_summary_prompt(&recent, &stats);
        let summary = self.ask(&prompt, Mode::Journaling).await;
        WeeklySummary { summary, stats }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{assistant, assistant_with};
    use super::*;
    use crate::llm::testing::ScriptedBackend;
    use crate::llm::ProviderError;
    use crate::stt::cloud::CloudStt;
    use chrono::Duration;

    #[tokio::test]
    async fn test_chat_records_conversation_and_tasks() {
        let (assistant, store) = assistant(
            "chat",
            "Here you go:\n1. Outline the blog post intro\n2. Book the dentist appointment",
        );
        let reply = assistant.chat("Help me plan", Emotion::Excited).await;

        assert!(reply.audio_available);
        assert!(reply.response.starts_with("Here you go"));

        let log = store.load_conversations();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].user, "Help me plan");
        assert!(log[0].kind.is_none());

        let tasks: Vec<String> = assistant.tasks().into_iter().map(|t| t.task).collect();
        assert_eq!(tasks, vec!["Outline the blog post intro", "Book the dentist appointment"]);
    }

    #[tokio::test]
    async fn test_chat_uses_planning_prompt_with_context() {
        let groq = ScriptedBackend::replying(ProviderKind::Groq, "ok");
        let system = groq.last_system.clone();
        let (assistant, _) = assistant_with("planning_prompt", groq, None);

        assistant.chat("first", Emotion::Friendly).await;
        assistant.chat("second", Emotion::Friendly).await;

        let last = system.lock().unwrap().clone().unwrap();
        assert!(last.contains("productivity coach"));
        assert!(last.contains("User: first\nAssistant: ok"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_still_a_reply() {
        let groq = ScriptedBackend::failing(ProviderKind::Groq, ProviderError::Network("timeout".into()));
        let (assistant, store) = assistant_with("apology", groq, None);

        let reply = assistant.chat("hello", Emotion::Friendly).await;
        assert!(reply.response.starts_with("Sorry, I had trouble thinking."));
        assert_eq!(store.load_conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_task_operations() {
        let (assistant, _) = assistant("tasks", "9:00 AM: Morning run around the park");
        assistant.chat("plan", Emotion::Friendly).await;

        assert!(assistant.complete_task(0));
        assert!(!assistant.complete_task(1));
        assert!(assistant.tasks()[0].completed);

        assistant.clear_tasks();
        assert!(assistant.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_journal_entry_defaults_mood() {
        let groq = ScriptedBackend::replying(ProviderKind::Groq, "That sounds hard. Be gentle with yourself.");
        let system = groq.last_system.clone();
        let (assistant, store) = assistant_with("journal_entry", groq, None);

        let reply = assistant.add_journal_entry("Rough day at work", None).await;
        assert_eq!(reply.entry.id, 1);
        assert_eq!(reply.entry.mood.as_deref(), Some("neutral"));
        assert_eq!(reply.entry.ai_response, "That sounds hard. Be gentle with yourself.");
        assert!(reply.audio_available);
        assert!(system.lock().unwrap().as_deref().unwrap().contains("journaling companion"));

        let second = assistant.add_journal_entry("Better today", Some("happy")).await;
        assert_eq!(second.entry.id, 2);
        assert_eq!(store.load_journal().len(), 2);
    }

    #[tokio::test]
    async fn test_journal_reply_serializes_flat() {
        let (assistant, _) = assistant("journal_flat", "Nice.");
        let reply = assistant.add_journal_entry("Walked the dog", Some("calm")).await;
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["entry"], "Walked the dog");
        assert_eq!(json["mood"], "calm");
        assert_eq!(json["audio_available"], true);
    }

    #[tokio::test]
    async fn test_weekly_summary_empty() {
        let (assistant, _) = assistant("summary_empty", "unused");
        let summary = assistant.weekly_summary().await;
        assert_eq!(summary, WeeklySummary::empty());
    }

    #[tokio::test]
    async fn test_weekly_summary_with_entries() {
        let (assistant, store) = assistant("summary", "You had a balanced week.");
        let now = Local::now().naive_local();
        let entries = vec![
            JournalEntry::new(1, "Finished the book", "happy", "", now - Duration::days(1)),
            JournalEntry::new(2, "Long meeting day", "tired", "", now - Duration::days(2)),
            JournalEntry::new(3, "Old news", "sad", "", now - Duration::days(30)),
        ];
        store.save_journal(&entries).unwrap();

        let summary = assistant.weekly_summary_at(now).await;
        assert_eq!(summary.summary, "You had a balanced week.");
        assert_eq!(summary.stats.total_entries, 2);
        assert_eq!(summary.stats.most_common_mood, "happy");
        assert_eq!(summary.stats.days_journaled, 2);
    }

    #[tokio::test]
    async fn test_journal_reply_schedule_becomes_tasks() {
        let (assistant, store) = assistant(
            "journal_tasks",
            "Sounds like a full week.\n9:00 AM: Reflect on the week's wins",
        );
        assert!(store.load_tasks().is_empty());

        assistant.add_journal_entry("Shipped the release", Some("proud")).await;

        let tasks = store.load_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task, "9:00 AM: Reflect on the week's wins");
    }

    #[tokio::test]
    async fn test_weekly_summary_schedule_becomes_tasks() {
        let (assistant, store) = assistant(
            "summary_tasks",
            "A steady week.\n9:00 AM: Reflect on the week's wins",
        );
        let now = Local::now().naive_local();
        store
            .save_journal(&[JournalEntry::new(1, "Cleaned the garage", "tired", "", now - Duration::days(1))])
            .unwrap();

        assistant.weekly_summary_at(now).await;
        assert_eq!(store.load_tasks().len(), 1);

        assistant.weekly_summary_at(now).await;
        assert_eq!(store.load_tasks().len(), 2);
    }

    #[tokio::test]
    async fn test_search_journal() {
        let (assistant, _) = assistant("search", "ok");
        assistant.add_journal_entry("Garden is blooming", Some("joyful")).await;
        assistant.add_journal_entry("Traffic was awful", Some("annoyed")).await;

        assert_eq!(assistant.search_journal("GARDEN").len(), 1);
        assert_eq!(assistant.search_journal("annoy")[0].id, 2);
        assert_eq!(assistant.search_journal("").len(), 2);
    }

    #[tokio::test]
    async fn test_journal_prompts_returns_three() {
        let (assistant, _) = assistant("prompts", "ok");
        assert_eq!(assistant.journal_prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_voice_without_recognizer_fails() {
        let (assistant, store) = assistant("voice_none", "ok");
        let err = assistant.voice(b"RIFF", Some("clip.wav")).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
        assert!(store.load_conversations().is_empty());
    }

    #[tokio::test]
    async fn test_voice_upload_is_removed_after_failed_transcription() {
        let stt = SttAdapter::Cloud(CloudStt::groq(
            "gsk-test",
            Some("http://127.0.0.1:9/v1/audio/transcriptions"),
            None,
        ));
        let groq = ScriptedBackend::replying(ProviderKind::Groq, "ok");
        let (assistant, _) = assistant_with("voice_cleanup", groq, Some(stt));

        assert!(assistant.voice(b"RIFF0000WAVE", Some("clip.webm")).await.is_err());

        let leftovers: Vec<_> = std::fs::read_dir(test_dir_path("voice_cleanup"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("upload-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    fn test_dir_path(test_name: &str) -> PathBuf {
        std::env::temp_dir().join("daymind-test-assistant").join(test_name)
    }
}
