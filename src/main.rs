//! agentstep-server: the debugger coordinator binary.
//!
//! Mediates between exactly one connected Agent peer and at most one UI
//! peer over two separate WebSocket listeners (§2, §5).

mod cli;
mod codec;
mod coordinator;
mod domain;
mod error;
mod log_writer;
mod registry;
mod session;
mod state;
mod summarizer;
mod ui_wire;
mod version;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coordinator::Coordinator;
use session::agent_session::{self, AgentSessionState};
use session::ui_session::{self, UiSessionState};
use summarizer::{HttpSummarizer, NullSummarizer, PromptTemplates, Summarizer};
use version::Version;

/// This coordinator's own build, stamped onto every run it creates and
/// checked against every run it imports or preloads (§4.4).
const SERVER_VERSION: &str = "v1.0.0-beta.pre-2";

fn build_summarizer(model: &str, templates: Arc<PromptTemplates>) -> Arc<dyn Summarizer> {
    if std::env::var("OPENAI_API_KEY").is_ok() {
        Arc::new(HttpSummarizer::new(model, templates))
    } else {
        tracing::warn!("OPENAI_API_KEY not set; summaries are disabled");
        Arc::new(NullSummarizer)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentstep_core=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let args = cli::parse_args();

    let server_version: Version = SERVER_VERSION
        .parse()
        .expect("SERVER_VERSION is a well-formed version string");

    let prompts_dir = std::env::var("AGENTSTEP_PROMPTS_DIR").unwrap_or_else(|_| "prompts".to_string());
    let templates = Arc::new(PromptTemplates::load_from_dir(&prompts_dir));
    let summarizer = build_summarizer(&args.model, templates);

    let coordinator = Arc::new(Mutex::new(Coordinator::new(server_version, summarizer)));

    for path in &args.runs {
        coordinator.lock().await.preload_run_file(path);
    }

    let logs_dir = Arc::new(PathBuf::from("logs"));

    let agent_state = AgentSessionState {
        coordinator: Arc::clone(&coordinator),
        logs_dir,
    };
    let agent_app = agent_session::router(agent_state).layer(TraceLayer::new_for_http());

    let ui_state = UiSessionState {
        coordinator: Arc::clone(&coordinator),
    };
    let ui_app = ui_session::router(ui_state).layer(TraceLayer::new_for_http());

    let agent_addr = format!("{}:{}", args.host, args.client_port);
    let ui_addr = format!("{}:{}", args.host, args.ui_port);

    let agent_listener = tokio::net::TcpListener::bind(&agent_addr).await?;
    let ui_listener = tokio::net::TcpListener::bind(&ui_addr).await?;

    tracing::info!(addr = %agent_addr, "agent listener bound");
    tracing::info!(addr = %ui_addr, "UI listener bound");

    let agent_server = axum::serve(agent_listener, agent_app);
    let ui_server = axum::serve(ui_listener, ui_app);

    tokio::try_join!(
        async { agent_server.await.map_err(Into::<Box<dyn std::error::Error>>::into) },
        async { ui_server.await.map_err(Into::<Box<dyn std::error::Error>>::into) },
    )?;

    Ok(())
}
