use anyhow::Context;
use pharmacy_admin::{api, config::Config, db::init_db, Repository};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;

    let pool = init_db(&config.database_path).await.with_context(|| {
        format!(
            "Failed to initialize database at {}",
            config.database_path.display()
        )
    })?;
    let repo = Arc::new(Repository::new(pool, config.database_path.clone()));

    tracing::info!(
        database = %config.database_path.display(),
        backup_dir = %config.backup_dir.display(),
        "Backups enabled"
    );

    let addr = SocketAddr::new(config.host, config.port);
    let app = api::create_router(api::AppState::new(repo, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
