//! DayMind: a planning and journaling assistant backend.
//!
//! Text or voice input goes to a hosted language model. Tasks are mined
//! from the replies, state lives in flat JSON files in the data directory,
//! and replies are spoken through a cloud or local TTS engine.

pub mod assistant;
pub mod config;
pub mod extract;
pub mod journal;
pub mod llm;
pub mod logger;
pub mod prompts;
pub mod server;
pub mod store;
pub mod stt;
pub mod tts;
