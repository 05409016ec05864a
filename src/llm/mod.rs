//! Language-model completion with deterministic fallback.
//!
//! One provider is active process-wide. A request runs an ordered attempt
//! plan (`[active, groq]`, or just `[groq]`), and each attempt ends in a typed
//! outcome. Groq is the floor: when it fails the caller gets an apology
//! string instead of an error.

pub mod anthropic;
pub mod openai_compat;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::DaymindConfig;
use crate::extract::extract_tasks;
use crate::store::{now_timestamp, Store};

/// Sampling temperature sent to every provider.
pub const TEMPERATURE: f32 = 0.7;

/// Output token ceiling sent to every provider.
pub const MAX_OUTPUT_TOKENS: u32 = 1000;

/// Prefix of the reply returned when the fallback floor fails.
pub const APOLOGY_PREFIX: &str = "Sorry, I had trouble thinking.";

// ---------------------------------------------------------------------------
// Provider identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Groq,
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    /// Parse a provider name. Unknown names select Groq.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Self::Anthropic,
            "openai" => Self::OpenAi,
            _ => Self::Groq,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a single completion request did not produce text.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// No API key configured; nothing was sent.
    MissingKey(ProviderKind),
    /// Transport failure (DNS, TLS, timeout, ...).
    Network(String),
    /// Non-2xx response.
    Status { status: u16, body: String },
    /// 2xx response without the expected reply text.
    MalformedResponse(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey(kind) => write!(f, "{} API key not configured", kind),
            Self::Network(msg) => write!(f, "request failed: {}", msg),
            Self::Status { status, body } => write!(f, "API error {}: {}", status, body),
            Self::MalformedResponse(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// A remote chat-completion service (dyn-compatible).
pub trait CompletionBackend: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether an API key is configured. Checked before any request.
    fn has_key(&self) -> bool;

    /// Send one system + user exchange and return the reply text.
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>>;
}

/// Build the shared HTTP client. LLM calls have no timeout unless one is set.
pub fn build_http_client(timeout_secs: Option<u64>) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
}

/// Turn a non-2xx response into `ProviderError::Status`, pass others through.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::Status { status, body })
}

// ---------------------------------------------------------------------------
// Attempt plan
// ---------------------------------------------------------------------------

/// Result of one step of the attempt plan.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(String),
    /// Failed, but a later step may still answer.
    Recoverable(ProviderError),
    /// Failed at the floor; stop and apologize.
    Terminal(ProviderError),
}

/// Providers to try, in order, for the given active provider.
pub fn attempt_plan(active: ProviderKind) -> Vec<ProviderKind> {
    if active == ProviderKind::Groq {
        vec![ProviderKind::Groq]
    } else {
        vec![active, ProviderKind::Groq]
    }
}

/// Classify a failed attempt. Groq failures end the plan.
pub fn classify_failure(kind: ProviderKind, error: ProviderError) -> AttemptOutcome {
    if kind == ProviderKind::Groq {
        AttemptOutcome::Terminal(error)
    } else {
        AttemptOutcome::Recoverable(error)
    }
}

/// The reply sent back when every attempt has failed.
pub fn apology(error: &ProviderError) -> String {
    format!("{} Error: {}", APOLOGY_PREFIX, error)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Runs the attempt plan and records extracted tasks for successful replies.
pub struct ProviderClient {
    active: ProviderKind,
    backends: Vec<Box<dyn CompletionBackend>>,
    store: Arc<dyn Store>,
}

impl ProviderClient {
    pub fn new(
        active: ProviderKind,
        backends: Vec<Box<dyn CompletionBackend>>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            active,
            backends,
            store,
        }
    }

    /// Build the three HTTP backends from configuration.
    pub fn from_config(config: &DaymindConfig, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let http = build_http_client(config.llm_timeout_secs)?;
        let backends: Vec<Box<dyn CompletionBackend>> = vec![
            Box::new(openai_compat::OpenAiCompatBackend::groq(&config.groq, http.clone())),
            Box::new(anthropic::AnthropicBackend::new(&config.anthropic, http.clone())),
            Box::new(openai_compat::OpenAiCompatBackend::openai(&config.openai, http)),
        ];
        let active = ProviderKind::parse(&config.ai_provider);
        info!(provider = %active, "LLM provider configured");
        Ok(Self::new(active, backends, store))
    }

    pub fn active(&self) -> ProviderKind {
        self.active
    }

    fn backend(&self, kind: ProviderKind) -> Option<&dyn CompletionBackend> {
        self.backends
            .iter()
            .find(|b| b.kind() == kind)
            .map(|b| b.as_ref())
    }

    /// Run one step of the plan.
    pub async fn attempt(&self, kind: ProviderKind, system: &str, user: &str) -> AttemptOutcome {
        let backend = match self.backend(kind) {
            Some(b) if b.has_key() => b,
            _ => return classify_failure(kind, ProviderError::MissingKey(kind)),
        };
        match backend.complete(system, user).await {
            Ok(text) => AttemptOutcome::Success(text),
            Err(e) => classify_failure(kind, e),
        }
    }

    /// Produce a reply for `user` under `system`. Never fails: the floor
    /// failure comes back as an apology string.
    pub async fn complete(&self, system: &str, user: &str) -> String {
        let mut last_error = ProviderError::MissingKey(ProviderKind::Groq);

        for kind in attempt_plan(self.active) {
            match self.attempt(kind, system, user).await {
                AttemptOutcome::Success(text) => {
                    info!(provider = %kind, chars = text.len(), "LLM reply received");
                    self.record_tasks(&text);
                    return text;
                }
                AttemptOutcome::Recoverable(e) => {
                    warn!(provider = %kind, error = %e, "Provider failed, falling back to groq");
                    last_error = e;
                }
                AttemptOutcome::Terminal(e) => {
                    warn!(provider = %kind, error = %e, "Fallback provider failed");
                    return apology(&e);
                }
            }
        }

        apology(&last_error)
    }

    fn record_tasks(&self, reply: &str) {
        let tasks = extract_tasks(reply);
        if tasks.is_empty() {
            return;
        }
        match self.store.append_tasks(&tasks, &now_timestamp()) {
            Ok(()) => info!(count = tasks.len(), "Tasks extracted"),
            Err(e) => warn!("Failed to save extracted tasks: {}", e),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backends shared by tests across the crate.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub struct ScriptedBackend {
        pub kind: ProviderKind,
        pub has_key: bool,
        pub reply: Result<String, ProviderError>,
        pub calls: Arc<AtomicUsize>,
        pub last_system: Arc<Mutex<Option<String>>>,
    }

    impl ScriptedBackend {
        pub fn replying(kind: ProviderKind, text: &str) -> Self {
            Self {
                kind,
                has_key: true,
                reply: Ok(text.to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
                last_system: Arc::new(Mutex::new(None)),
            }
        }

        pub fn failing(kind: ProviderKind, error: ProviderError) -> Self {
            Self {
                reply: Err(error),
                ..Self::replying(kind, "")
            }
        }

        pub fn without_key(kind: ProviderKind) -> Self {
            Self {
                has_key: false,
                ..Self::replying(kind, "unreachable")
            }
        }

        pub fn call_count(&self) -> Arc<AtomicUsize> {
            self.calls.clone()
        }
    }

    impl CompletionBackend for ScriptedBackend {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn has_key(&self) -> bool {
            self.has_key
        }

        fn complete<'a>(
            &'a self,
            system: &'a str,
            _user: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                *self.last_system.lock().unwrap() = Some(system.to_string());
                self.reply.clone()
            })
        }
    }

    /// Start an in-process HTTP stand-in for the provider APIs and return
    /// its base URL. Each path prefix scripts one kind of response:
    /// `/ok`, `/error` (500), `/text` (200, not JSON), `/empty` (200, JSON
    /// without reply text). `/ok` requires the key `test-key`.
    pub async fn stub_server() -> String {
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::post;
        use axum::{Json, Router};

        fn authorized(headers: &HeaderMap) -> bool {
            let bearer = headers.get("authorization").and_then(|v| v.to_str().ok());
            let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
            bearer == Some("Bearer test-key") || api_key == Some("test-key")
        }

        let app = Router::new()
            .route(
                "/ok/chat/completions",
                post(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return Err((StatusCode::UNAUTHORIZED, "invalid api key"));
                    }
                    Ok(Json(serde_json::json!({
                        "choices": [{"message": {"role": "assistant", "content": "stub reply"}}]
                    })))
                }),
            )
            .route(
                "/ok/messages",
                post(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return Err((StatusCode::UNAUTHORIZED, "invalid api key"));
                    }
                    Ok(Json(serde_json::json!({
                        "content": [{"type": "text", "text": "stub reply"}]
                    })))
                }),
            )
            .route(
                "/error/chat/completions",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
            )
            .route(
                "/error/messages",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
            )
            .route("/text/chat/completions", post(|| async { "not json at all" }))
            .route("/text/messages", post(|| async { "not json at all" }))
            .route(
                "/empty/chat/completions",
                post(|| async { Json(serde_json::json!({"id": "chatcmpl-1"})) }),
            )
            .route(
                "/empty/messages",
                post(|| async { Json(serde_json::json!({"id": "msg_1"})) }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    pub fn stub_settings(base: &str, prefix: &str) -> crate::config::ProviderSettings {
        crate::config::ProviderSettings {
            api_key: Some("test-key".into()),
            base_url: Some(format!("{}/{}", base, prefix)),
            model: None,
        }
    }

    pub fn client(
        active: ProviderKind,
        backends: Vec<ScriptedBackend>,
        store: Arc<dyn Store>,
    ) -> ProviderClient {
        let backends = backends
            .into_iter()
            .map(|b| Box::new(b) as Box<dyn CompletionBackend>)
            .collect();
        ProviderClient::new(active, backends, store)
    }
}
