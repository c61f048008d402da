//! Gateway HTTP server.

use crate::activity::Activity;
use crate::bot::{Bot, BotError};
use crate::channels::ConnectorClient;
use crate::config::{self, Config};
use crate::gateway::auth;
use crate::pizza::pizza_form;
use crate::session::SessionStore;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// When Some, activity posts must carry `Authorization: Bearer` with this token.
    pub required_token: Option<String>,
    pub bot: Arc<Bot>,
}

impl GatewayState {
    pub fn new(config: Config, bot: Bot) -> Self {
        let required_token = auth::required_token(&config);
        Self {
            config: Arc::new(config),
            required_token,
            bot: Arc::new(bot),
        }
    }
}

/// Routes: `GET /` (health) and `POST /api/messages` behind the bearer guard.
pub fn app(state: GatewayState) -> Router {
    let messages = Router::new()
        .route("/api/messages", post(post_activity))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));
    Router::new()
        .route("/", get(health_http))
        .merge(messages)
        .with_state(state)
}

/// Build the bot from config: pizza form, session store, connector client.
fn build_bot(config: &Config, config_path: &std::path::Path) -> Result<Bot> {
    let form = pizza_form(config.bot.max_attempts).context("building the pizza order form")?;
    let sessions = match config::resolve_sessions_dir(config, config_path) {
        Some(dir) => {
            log::info!("form sessions persisted under {}", dir.display());
            SessionStore::with_dir(dir)
        }
        None => SessionStore::new(),
    };
    let connector = ConnectorClient::new(
        config.connector.service_url.clone(),
        config::resolve_connector_token(config),
    );
    Ok(Bot::new(form, sessions, Arc::new(connector)))
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// When bind is not loopback, a gateway token must be configured or startup fails.
/// Blocks until shutdown (e.g. Ctrl+C).
/// `config_path` is the path to the config file (used to resolve a relative sessions directory).
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    let bind = config.gateway.bind.trim().to_string();
    if !config::is_loopback_bind(&bind) {
        let token = config::resolve_gateway_token(&config);
        if token.is_none() || config.gateway.auth.mode != config::GatewayAuthMode::Token {
            anyhow::bail!(
                "refusing to bind gateway to {} without auth (set gateway.auth.mode to \"token\" and gateway.auth.token or PIZZABOT_GATEWAY_TOKEN)",
                bind
            );
        }
    }

    let bot = build_bot(&config, &config_path)?;
    let port = config.gateway.port;
    let state = GatewayState::new(config, bot);
    if state.required_token.is_some() {
        log::info!("activity posts require a bearer token");
    }

    let bind_addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// In-flight turns finish before the server returns.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /api/messages: one activity per call. 202 once the turn's replies are sent.
async fn post_activity(State(state): State<GatewayState>, body: Bytes) -> StatusCode {
    let activity: Activity = match serde_json::from_slice(&body) {
        Ok(a) => a,
        Err(e) => {
            log::debug!("rejecting activity: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    match state.bot.handle_activity(&activity).await {
        Ok(outcome) => {
            log::debug!("turn done in {}: {:?}", activity.conversation.id, outcome);
            StatusCode::ACCEPTED
        }
        Err(BotError::Activity(e)) => {
            log::debug!("rejecting activity: {}", e);
            StatusCode::BAD_REQUEST
        }
        Err(e) => {
            log::warn!("turn failed in {}: {}", activity.conversation.id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
        "form": state.bot.form().name(),
        "activeSessions": state.bot.sessions().active_count().await,
    }))
}
