use daily_reader::{
    identity::{IdentityProvider, LocalIdentityProvider},
    plan::SystemClock,
    readings::load_catalog,
    router,
    session::{SessionController, SessionSettings, forward_identity, run_event_loop},
    storage::JsonRecordStore,
    AppConfig, AppState,
};
use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};
use tokio::{fs, signal, sync::mpsc};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const PERSIST_BACKOFF: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = AppConfig::from_env()?;
    for path in [&config.data_path, &config.accounts_path] {
        ensure_parent(path).await?;
    }

    let catalog = Arc::new(load_catalog(&config.readings_path).await);
    let store = Arc::new(JsonRecordStore::open(config.data_path.clone()).await);
    let identity: Arc<dyn IdentityProvider> =
        Arc::new(LocalIdentityProvider::open(config.accounts_path.clone()).await);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let session = SessionController::new(
        store,
        catalog,
        Arc::new(SystemClock),
        SessionSettings {
            default_start: config.default_start,
            persist_attempts: config.persist_attempts,
            persist_backoff: PERSIST_BACKOFF,
        },
        events_tx.clone(),
    );
    let state = AppState::new(session, identity.clone());

    forward_identity(identity.on_state_change(), events_tx);
    tokio::spawn(run_event_loop(state.session.clone(), events_rx));

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!(start = %config.default_start, "listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}

async fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}
