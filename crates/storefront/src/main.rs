//! TrendMart storefront - headless client runner.
//!
//! Boots the storefront core against the configured backend and keeps it
//! reconciled until interrupted.
//!
//! # Lifecycle
//!
//! - Load configuration (`.env` and process environment)
//! - Initialize Sentry and tracing
//! - Build the application state (restores the saved cart)
//! - Resolve the current session, then follow auth events
//! - Log session and cart changes until Ctrl+C or SIGTERM

#![cfg_attr(not(test), forbid(unsafe_code))]

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trendmart_storefront::config::StorefrontConfig;
use trendmart_storefront::db::products::ProductFilter;
use trendmart_storefront::error::AppError;
use trendmart_storefront::models::SessionState;
use trendmart_storefront::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "trendmart_storefront=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    tracing::info!(
        backend = ?config.backend,
        cart_path = %config.cart_path.display(),
        "Starting storefront"
    );

    let state = AppState::new(config).expect("Failed to initialize application state");

    match state.catalog().list_products(&ProductFilter::default()).await {
        Ok(products) => tracing::info!(products = products.len(), "Catalog reachable"),
        Err(e) => AppError::from(e).report(),
    }

    state.session().check_user().await;
    log_session(&state.session().snapshot());

    let listener = state.session().listen();
    let mut session_changes = state.session().subscribe();
    let mut cart_changes = state.cart().subscribe();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Ok(()) = session_changes.changed() => {
                let snapshot = session_changes.borrow_and_update().clone();
                log_session(&snapshot);
            }
            Ok(()) = cart_changes.changed() => {
                let cart = cart_changes.borrow_and_update().clone();
                tracing::info!(
                    items = cart.item_count(),
                    total = %cart.total_price(),
                    "Cart changed"
                );
            }
            () = &mut shutdown => break,
        }
    }

    listener.unsubscribe();
    tracing::info!("Storefront stopped");
}

fn log_session(state: &SessionState) {
    tracing::info!(
        phase = ?state.phase(),
        user_id = state.user().map(|u| u.id.to_string()),
        username = state.profile().map(|p| p.username.as_str()),
        "Session"
    );
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping");
}
