use anyhow::{Context, Result};
use gsc_bridge::api::{create_app, AppState};
use gsc_bridge::clock::{Clock, SystemClock};
use gsc_bridge::config::{AppConfig, Secrets, CONFIG_PATH_ENV};
use gsc_bridge::credentials::{CredentialStore, RefreshGate};
use gsc_bridge::gsc::SearchConsoleClient;
use gsc_bridge::oauth::{run_nonce_cleanup, GoogleProvider, NonceRegistry, OAuthFlow};
use gsc_bridge::storage::MemoryStore;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gsc_bridge=info".into()),
        )
        .init();

    info!("gsc-bridge starting...");

    let config_path = std::env::var(CONFIG_PATH_ENV).ok();
    let config = AppConfig::load(config_path.as_deref())?;
    config.validate().context("Invalid configuration")?;
    let timings = config.oauth.timings()?;

    let secrets = Secrets::from_env().context("ENCRYPTION_KEY is required (base64-encoded 32-byte key)")?;
    let envelope = secrets.envelope().context("Invalid ENCRYPTION_KEY")?;
    let signer = secrets.state_signer().context("Invalid state signing secret")?;

    info!(
        port = config.server.port,
        app_url = %config.server.app_url,
        dedicated_state_secret = secrets.state_secret.is_some(),
        "Configuration loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let credential_store = Arc::new(CredentialStore::new(
        Arc::new(MemoryStore::new()),
        envelope,
        Arc::clone(&clock),
    ));

    let nonces = NonceRegistry::new(
        Arc::new(MemoryStore::new()),
        Arc::clone(&clock),
        timings.nonce_ttl_ms,
    );

    let provider = Arc::new(GoogleProvider::with_clock(
        config.google.clone(),
        Arc::clone(&clock),
    ));

    let flow = OAuthFlow::new(
        nonces.clone(),
        signer,
        provider.clone(),
        Arc::clone(&credential_store),
        Arc::clone(&clock),
        config.google.scopes.clone(),
    )
    .with_fallback_expiry_ms(timings.fallback_expiry_ms);

    let refresh_gate = RefreshGate::new(Arc::clone(&credential_store), provider, clock)
        .with_buffer_ms(timings.refresh_buffer_ms)
        .with_fallback_expiry_ms(timings.fallback_expiry_ms);

    // Sweep nonces from abandoned flows
    tokio::spawn(run_nonce_cleanup(
        nonces,
        config.oauth.cleanup_interval_seconds,
    ));

    let state = AppState {
        flow: Arc::new(flow),
        refresh_gate: Arc::new(refresh_gate),
        gsc: SearchConsoleClient::new(&config.google),
        app_url: config.server.app_url.clone(),
    };
    let router = create_app(state, config.server.body_limit_bytes)?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.server.port))
        .await
        .context("Failed to bind API port")?;
    info!(port = config.server.port, "gsc-bridge listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("API server error")?;

    info!("gsc-bridge stopped");
    Ok(())
}
