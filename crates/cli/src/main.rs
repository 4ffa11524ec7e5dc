//! `colab-watch`: watch the ClawColab platform and log matching ideas.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Wire observability**: `tracing-subscriber` with an `EnvFilter` and a
//!    JSON layer, plus an OpenTelemetry OTLP exporter when
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
//! 2. **Load configuration** from `CLAWCOLAB_*` environment variables.
//! 3. **Construct infrastructure**: one [`client::ColabClient`], injected into
//!    the [`watcher::Watcher`] as both item feed and voter.
//! 4. **Register** when no token is configured and `CLAWCOLAB_BOT_NAME` is set.
//! 5. **Poll** until Ctrl-C, then stop the loop and flush telemetry.

use std::sync::Arc;

use anyhow::{Context, Result};
use client::{ClientConfig, ColabClient};
use colab::{Activity, BotProfile, Tag};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use watcher::{from_fn, HandlerError, PollConfig, Watcher};

const SERVICE_NAME: &str = "colab-watch";

const ENV_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const ENV_BOT_NAME: &str = "CLAWCOLAB_BOT_NAME";
const ENV_BOT_TYPE: &str = "CLAWCOLAB_BOT_TYPE";
const ENV_CAPABILITIES: &str = "CLAWCOLAB_CAPABILITIES";
const DEFAULT_BOT_TYPE: &str = "assistant";

#[tokio::main]
async fn main() -> Result<()> {
    let provider = init_tracing()?;

    let outcome = run().await;
    if let Err(err) = &outcome {
        tracing::error!(error = %format!("{err:#}"), "colab-watch exiting with error");
    }

    if let Some(provider) = provider {
        if let Err(err) = provider.shutdown() {
            eprintln!("failed to flush traces: {err}");
        }
    }
    outcome
}

// ---------------------------------------------------------------------------
// Observability
// ---------------------------------------------------------------------------

/// Installs the global subscriber. Returns the tracer provider when OTLP
/// export is enabled so it can be flushed on exit.
fn init_tracing() -> Result<Option<TracerProvider>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false);

    let provider = match env_value(ENV_OTLP_ENDPOINT) {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .build()
                .context("failed to build OTLP span exporter")?;
            Some(
                TracerProvider::builder()
                    .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
                    .with_resource(Resource::new(vec![KeyValue::new(
                        "service.name",
                        SERVICE_NAME,
                    )]))
                    .build(),
            )
        }
        None => None,
    };
    let otel = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(SERVICE_NAME)));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(otel)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(provider)
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

async fn run() -> Result<()> {
    let client_config = ClientConfig::from_env().context("invalid client configuration")?;
    let poll_config = PollConfig::from_env().context("invalid poll configuration")?;
    let client = Arc::new(ColabClient::from_config(&client_config).context("failed to build client")?);

    info!(
        base_url = %client.session().base_address(),
        interval_secs = poll_config.interval().as_secs(),
        page_size = poll_config.page_size(),
        interests = %poll_config.interests(),
        "starting colab-watch"
    );

    match client.health().await {
        Ok(status) if status.is_healthy() => info!(status = %status.status, "platform healthy"),
        Ok(status) => warn!(status = %status.status, "platform reports degraded health"),
        Err(err) => warn!(error = %err, "health check failed; polling anyway"),
    }

    if !client.session().is_authenticated() {
        match profile_from_env() {
            Some(profile) => {
                let registration = client
                    .register(&profile)
                    .await
                    .with_context(|| format!("failed to register bot '{}'", profile.name))?;
                info!(bot_id = %registration.id, "registered bot");
            }
            None => warn!("no credentials configured; authenticated actions will be refused"),
        }
    }

    let mut watcher = Watcher::new(client.clone(), poll_config).with_voter(client.clone());
    let poller_id = watcher
        .start_polling(Arc::new(from_fn(log_activity)))
        .context("failed to start polling")?;
    info!(%poller_id, "polling; press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("shutdown requested");
    if let Some(summary) = watcher.stop_polling().await {
        info!(
            cycles = summary.cycles,
            failures = summary.failures,
            dispatched = summary.dispatched,
            "polling stopped"
        );
    }
    Ok(())
}

async fn log_activity(activity: Activity) -> Result<(), HandlerError> {
    match &activity {
        Activity::NewItem(item) => info!(
            kind = activity.kind(),
            item_id = %item.id,
            title = %item.title,
            tags = %item.tags.iter().map(Tag::as_str).collect::<Vec<_>>().join(","),
            votes = item.vote_count,
            "new matching item"
        ),
    }
    Ok(())
}

fn profile_from_env() -> Option<BotProfile> {
    let name = env_value(ENV_BOT_NAME)?;
    let kind = env_value(ENV_BOT_TYPE).unwrap_or_else(|| DEFAULT_BOT_TYPE.to_owned());
    let capabilities = env_value(ENV_CAPABILITIES)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    Some(BotProfile::new(name, kind, capabilities))
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
