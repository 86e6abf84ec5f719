//! nexcall server binary: telephony webhooks and the call API.
//!
//! Starts an axum HTTP server with structured logging, database initialization,
//! the conversation eviction task, and graceful shutdown on SIGTERM/SIGINT.

use nexcall_agent::ChatAgent;
use nexcall_server::{
    app, background,
    config::{self, Config},
    conversation::{ConversationStore, InMemoryConversationStore},
    lifecycle::CallLifecycleHandler,
    persistence::SqliteCallStore,
    AppState,
};
use nexcall_telephony::TwilioClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("NEXCALL_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration, the server cannot start without valid config");

    init_tracing(&config);

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    if config.llm.api_key.is_empty() {
        tracing::warn!("no LLM API key configured, replies will fall back to a human transfer");
    }
    if !config.twilio.is_configured() {
        tracing::warn!("Twilio credentials missing, the call API cannot place or inspect calls");
    }

    // Initialize database
    let pool = nexcall_db::create_pool(&config.database.path, config.database.runtime_settings())
        .expect("failed to create database pool, check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            nexcall_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    let agent = ChatAgent::new(config.agent.clone(), &config.llm)
        .expect("failed to build chat agent, check [llm] in config");
    let telephony =
        TwilioClient::new(&config.twilio).expect("failed to build Twilio client, check [twilio]");
    let records = SqliteCallStore::new(
        pool.clone(),
        Duration::from_millis(config.database.op_timeout_ms),
    );
    let conversations: Arc<dyn ConversationStore> = Arc::new(InMemoryConversationStore::new());

    let lifecycle = CallLifecycleHandler::new(
        Arc::new(agent),
        Arc::new(records),
        conversations.clone(),
        config.voice.markup_options(),
    );

    tokio::spawn(background::start_eviction_task(
        conversations,
        config.conversations.idle_ttl_secs,
        config.conversations.sweep_interval_secs,
    ));

    let state = AppState {
        pool,
        lifecycle,
        telephony: Arc::new(telephony),
        caller_id: config.twilio.phone_number.clone(),
        webhook_url: config.webhook_url(),
        webhook_path: config.voice.webhook_path.clone(),
    };

    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, webhook = %config.webhook_url(), "starting nexcall server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address, is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("nexcall server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
