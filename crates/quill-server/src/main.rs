use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use quill_api::assist::AssistClient;
use quill_api::auth::{self, AppState, AppStateInner};

const PLACEHOLDER_ADMIN_PASSWORD: &str = "admin123";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill=debug,quill_api=debug,quill_db=info,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = env_or("QUILL_DB_PATH", "quill.db");
    let host = env_or("QUILL_HOST", "0.0.0.0");
    let port: u16 = env_or("QUILL_PORT", "5000").parse()?;
    let secure_cookies: bool = env_or("QUILL_SECURE_COOKIES", "false").parse()?;
    let ai_timeout: u64 = env_or("QUILL_AI_TIMEOUT_SECS", "60").parse()?;
    let admin_username = env_or("QUILL_ADMIN_USERNAME", "admin");
    let admin_email = env_or("QUILL_ADMIN_EMAIL", "admin@novel.com");
    let admin_password = env_or("QUILL_ADMIN_PASSWORD", PLACEHOLDER_ADMIN_PASSWORD);

    // Init database
    let db = quill_db::Database::open(&PathBuf::from(&db_path))?;

    if auth::ensure_super_admin(&db, &admin_username, &admin_email, &admin_password)?
        && admin_password == PLACEHOLDER_ADMIN_PASSWORD
    {
        warn!(
            "Super admin '{}' was created with the default password; set QUILL_ADMIN_PASSWORD or change it now",
            admin_username
        );
    }

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        assist: AssistClient::new(Duration::from_secs(ai_timeout))?,
        secure_cookies,
    });

    let app = quill_api::router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Quill listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
            },
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
