//! Optional external call that turns a breakpoint payload into a short
//! human label (§4.8). Failure is always non-fatal: a `None` return, logged
//! at `warn`, never propagated to the coordinator.

mod prompts;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::breakpoint::Breakpoint;
use crate::domain::event::EventKind;
use crate::domain::run::{effective_request_context, Run};

pub use prompts::PromptTemplates;

const SUMMARIZER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    QueryRequest,
    QueryResponse,
    ToolCall,
    ToolResult,
}

impl PromptKind {
    pub fn file_stem(self) -> &'static str {
        match self {
            PromptKind::QueryRequest => "summarize_query_request",
            PromptKind::QueryResponse => "summarize_query_response",
            PromptKind::ToolCall => "summarize_tool_call",
            PromptKind::ToolResult => "summarize_tool_result",
        }
    }

    /// Which `PromptKind` applies to a breakpoint given its event's kind and
    /// whether it's the event's begin breakpoint. `None` for event kinds the
    /// summarizer never handles (`program_started`, `program_finished`,
    /// `debug_message`).
    fn for_event(kind: EventKind, is_begin: bool) -> Option<Self> {
        match (kind, is_begin) {
            (EventKind::LlmQuery, true) => Some(PromptKind::QueryRequest),
            (EventKind::LlmQuery, false) => Some(PromptKind::QueryResponse),
            (EventKind::ToolInvocation, true) => Some(PromptKind::ToolCall),
            (EventKind::ToolInvocation, false) => Some(PromptKind::ToolResult),
            _ => None,
        }
    }
}

/// Injected at construction; the production implementation wraps a single
/// external HTTP call, tests inject a deterministic stub.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, kind: PromptKind, context: &str) -> Option<String>;
}

/// Given `(run, bp)`, resolves the prompt kind, builds the context (the
/// previous query's request payload prepended for `QueryRequest`), and
/// delegates to `summarizer`. Returns `None` without calling the summarizer
/// at all for event kinds it never handles.
pub async fn summarize_breakpoint(
    summarizer: &dyn Summarizer,
    run: &Run,
    bp: &Breakpoint,
) -> Option<String> {
    let event = run.events.get(&bp.event_id)?;
    let is_begin = event.is_begin(bp);
    let kind = PromptKind::for_event(event.kind, is_begin)?;

    let mut context = match bp.effective_data() {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if kind == PromptKind::QueryRequest {
        let prefix = effective_request_context(run, Some(event));
        if !prefix.is_empty() {
            context = format!("{prefix}\n---\n{context}");
        }
    }

    summarizer.summarize(kind, &context).await
}

/// Production summarizer: a single HTTP call to an OpenAI-compatible
/// completions endpoint, behind a fixed timeout. Mirrors the non-fatal,
/// `Option`-returning pattern this codebase already uses for LLM calls
/// elsewhere: on timeout, missing credential, or transport error it returns
/// `None` and logs at `warn`.
pub struct HttpSummarizer {
    client: reqwest::Client,
    model: String,
    api_key: Option<String>,
    templates: Arc<PromptTemplates>,
}

impl HttpSummarizer {
    pub fn new(model: impl Into<String>, templates: Arc<PromptTemplates>) -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").ok();
        if api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not set; summaries are disabled");
        }
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            api_key,
            templates,
        }
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, kind: PromptKind, context: &str) -> Option<String> {
        let api_key = self.api_key.as_ref()?;
        let Some(template) = self.templates.get(kind) else {
            return None;
        };
        let prompt = format!("{template}\n\n{context}");

        let request = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": 60,
            }))
            .send();

        match tokio::time::timeout(SUMMARIZER_TIMEOUT, request).await {
            Ok(Ok(resp)) => match resp.json::<serde_json::Value>().await {
                Ok(body) => extract_summary(&body),
                Err(e) => {
                    tracing::warn!(error = %e, "summarizer response decode failed");
                    None
                }
            },
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "summarizer request failed");
                None
            }
            Err(_) => {
                tracing::warn!("summarizer request timed out");
                None
            }
        }
    }
}

fn extract_summary(body: &serde_json::Value) -> Option<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// A summarizer that never succeeds — used when no credential is configured
/// so the coordinator still has a concrete `Summarizer` to hold, per
/// "constructed but every call short-circuits" (§6 Environment).
pub struct NullSummarizer;

#[async_trait]
impl Summarizer for NullSummarizer {
    async fn summarize(&self, _kind: PromptKind, _context: &str) -> Option<String> {
        None
    }
}
