//! Gateway HTTP server: health probe and the Slack interaction endpoint.

use crate::auth::ConfiguredPermissions;
use crate::channels::{InboundError, InboundEvent, SlackClient};
use crate::config::{self, Config};
use crate::domain::{BasicRenderer, MemoryDirectory};
use crate::gateway::protocol::{Health, InteractionForm};
use crate::init;
use crate::metadata::ProxyRouting;
use crate::routing::{Dispatcher, RoutingTable};
use crate::steps::StepContext;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Dispatches still running after their request was acknowledged.
type InteractionTasks = Arc<RwLock<Vec<JoinHandle<()>>>>;

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    /// When Some, interaction payloads must carry this verification token.
    pub verification_token: Option<String>,
    interactions: InteractionTasks,
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// When bind is not loopback, a verification token must be configured or startup fails.
/// Blocks until shutdown (e.g. Ctrl+C), then waits for acknowledged interactions to finish.
/// `config_path` is the path to the config file (used to resolve the directory file).
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    init::require_initialized(&config_path)?;
    let bind = config.gateway.bind.trim().to_string();
    let verification_token = config::resolve_verification_token(&config);
    if !config::is_loopback_bind(&bind) && verification_token.is_none() {
        anyhow::bail!(
            "refusing to bind gateway to {} without a verification token (set slack.verificationToken or SLACK_VERIFICATION_TOKEN)",
            bind
        );
    }

    let directory_path = config::resolve_directory_path(&config, &config_path);
    let directory = Arc::new(MemoryDirectory::load(&directory_path).await?);

    let bot_token = config::resolve_slack_bot_token(&config);
    if bot_token.is_none() {
        log::warn!("slack bot token not configured; outbound slack calls will fail");
    }
    let slack = SlackClient::new(
        bot_token,
        config.slack.api_base.clone(),
        config.slack.request_timeout(),
    )
    .context("building slack client")?;
    log::info!("slack web api at {}", slack.api_base());

    let ctx = StepContext {
        repository: directory,
        renderer: Arc::new(BasicRenderer),
        chat: Arc::new(slack),
        permissions: Arc::new(ConfiguredPermissions::from_config(&config.permissions)),
        metadata_router: Arc::new(ProxyRouting),
        channel_field: config.slack.message_channel_field,
    };
    let table = Arc::new(RoutingTable::builtin());
    log::info!("routing table has {} entries", table.len());
    for entry in table.entries() {
        log::debug!("route {:?} -> {}", entry.criteria, entry.step.routing_uid());
    }
    let dispatcher = Arc::new(Dispatcher::new(table, ctx, config.slack.step_timeout()));

    let port = config.gateway.port;
    // A step may run for its full timeout and then post a notice.
    let drain_deadline = config.slack.step_timeout() + config.slack.request_timeout();
    let interactions = InteractionTasks::default();
    let state = GatewayState {
        config: Arc::new(config),
        dispatcher,
        verification_token,
        interactions: interactions.clone(),
    };
    let app = Router::new()
        .route("/", get(health_http))
        .route("/slack/interactions", post(slack_interactions))
        .with_state(state);

    let bind_addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    drain_interactions(&interactions, drain_deadline).await;
    log::info!("gateway stopped");
    Ok(())
}

/// Remember a dispatch task, dropping handles of tasks that already finished.
async fn track_interaction(tasks: &InteractionTasks, handle: JoinHandle<()>) {
    let mut tasks = tasks.write().await;
    tasks.retain(|h| !h.is_finished());
    tasks.push(handle);
}

/// Await every tracked dispatch; whatever is still running after `deadline` is aborted.
async fn drain_interactions(tasks: &InteractionTasks, deadline: Duration) {
    let handles = std::mem::take(&mut *tasks.write().await);
    if handles.is_empty() {
        return;
    }
    log::info!("waiting for {} interaction(s) to finish", handles.len());
    let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
    let all = async {
        for h in handles {
            if let Err(e) = h.await {
                log::warn!("interaction task failed: {}", e);
            }
        }
    };
    if tokio::time::timeout(deadline, all).await.is_err() {
        log::warn!("interactions still running after {:?}; aborting", deadline);
        for abort in aborts {
            abort.abort();
        }
    }
}

/// Constant-time comparison of the verification token (length excepted).
fn token_matches(expected: &str, provided: Option<&str>) -> bool {
    let Some(provided) = provided else {
        return false;
    };
    let (expected, provided) = (expected.as_bytes(), provided.as_bytes());
    if expected.len() != provided.len() {
        return false;
    }
    expected
        .iter()
        .zip(provided)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
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
                log::error!("failed to install SIGTERM handler: {}", e);
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

/// POST /slack/interactions — parses the interaction, verifies the token, and hands the event
/// to the dispatcher on its own task. Slack only needs the acknowledgement.
async fn slack_interactions(
    State(state): State<GatewayState>,
    form: Result<Form<InteractionForm>, FormRejection>,
) -> StatusCode {
    let Ok(Form(form)) = form else {
        return StatusCode::BAD_REQUEST;
    };
    let event = match InboundEvent::from_payload_str(&form.payload) {
        Ok(event) => event,
        Err(InboundError::UnsupportedType(t)) => {
            log::debug!("ignoring interaction of type {}", t);
            return StatusCode::OK;
        }
        Err(e) => {
            log::warn!("rejecting interaction: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    if let Some(ref expected) = state.verification_token {
        if !token_matches(expected, event.verification_token.as_deref()) {
            log::warn!("interaction from {} has a bad verification token", event.user_id);
            return StatusCode::FORBIDDEN;
        }
    }
    let dispatcher = state.dispatcher.clone();
    let handle = tokio::spawn(async move {
        let outcome = dispatcher.handle(&event).await;
        log::debug!("{} from {}: {:?}", event.shape, event.user_id, outcome);
    });
    track_interaction(&state.interactions, handle).await;
    StatusCode::OK
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<Health> {
    Json(Health {
        runtime: "running".to_string(),
        port: state.config.gateway.port,
        routes: state.dispatcher.table().len(),
    })
}
