//! Grain Host
//!
//! Runs the `SecureAdder` sample actor behind the access-token filter and
//! makes one protected and one open call against it.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Build the call filter (discovery, introspection, validation cache)
//! 3. Spawn the `SecureAdder` actor
//! 4. Call `ping` (open) and `add` (protected, using `GRAIN_DEMO_BEARER_TOKEN`)
//! 5. Log the envelopes and stop

#![warn(clippy::pedantic)]

use anyhow::Context;
use common::secret::ExposeSecret;
use grain_host::actors::{ActorHandle, Add, AdditionCount, Ping, SecureAdder};
use grain_host::config::Config;
use grain_host::context::RequestContext;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grain_host=debug,grain=debug,common=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Grain Host");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        authority_url = %config.authority_url,
        introspection_client_id = %config.introspection_client_id,
        required_audience = %config.required_audience,
        expected_token_type = %config.expected_token_type,
        discovery_cache_ttl_seconds = config.discovery_cache_ttl.as_secs(),
        "Configuration loaded successfully"
    );

    let filter = grain_host::build_filter(&config);
    let adder = ActorHandle::spawn(SecureAdder::new(), filter);

    let pong = adder.call(Ping).await.context("ping call failed")?;
    info!(reply = %pong, "Ping completed");

    let context = match &config.demo_bearer_token {
        Some(token) => RequestContext::with_bearer(token.expose_secret()),
        None => {
            warn!("GRAIN_DEMO_BEARER_TOKEN not set, protected call will be denied");
            RequestContext::new()
        }
    };

    let envelope = RequestContext::scope(context, adder.call(Add { a: 2, b: 3 }))
        .await
        .context("add call failed")?;

    if envelope.success {
        info!(result = ?envelope.result, message = %envelope.message, "Add authorized");
    } else {
        warn!(message = %envelope.message, "Add denied");
    }

    let additions = adder
        .call(AdditionCount)
        .await
        .context("addition count call failed")?;
    info!(additions, "Grain Host finished");

    adder.cancel();
    Ok(())
}
