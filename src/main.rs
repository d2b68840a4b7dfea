//! Inkwell - A blog platform with a moderated content pipeline

use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inkwell::{
    ai::generator::DEFAULT_HISTORY_RETENTION_HOURS,
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db,
    services::view::DEFAULT_VIEW_RETENTION_DAYS,
};

/// Read notifications older than this are deleted
const NOTIFICATION_RETENTION_DAYS: i64 = 30;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkwell=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Inkwell...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!(applied, "Database migrations completed");

    let cache = create_cache(&config.cache);
    let state = AppState::build(pool, cache, &config);

    spawn_background_tasks(&state);

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_background_tasks(state: &AppState) {
    let ai_config = state.ai.config().clone();
    if !ai_config.enabled {
        tracing::info!("Scheduled generation disabled");
    } else if let Some(every) = ai_config.interval() {
        let ai = state.ai.clone();
        let batch_size = ai_config.batch_size;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let results = ai.batch_generate(batch_size, &[]).await;
                tracing::info!(generated = results.len(), "Scheduled generation finished");
            }
        });
        tracing::info!(every_hours = ai_config.interval_hours, "Scheduled generation enabled");
    } else {
        tracing::warn!(
            interval_hours = ai_config.interval_hours,
            "Scheduled generation disabled: interval out of range"
        );
    }

    // Session cleanup
    {
        let users = state.user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HOUR);
            loop {
                interval.tick().await;
                match users.clean_expired_sessions().await {
                    Ok(removed) if removed > 0 => {
                        tracing::info!(removed, "Expired sessions removed")
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    // Daily pruning of views, notifications and generator history
    {
        let views = state.view_service.clone();
        let notifications = state.notification_service.clone();
        let ai = state.ai.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(DAY);
            loop {
                interval.tick().await;
                match views.clean_old_views(DEFAULT_VIEW_RETENTION_DAYS).await {
                    Ok(removed) => tracing::info!(removed, "Old views pruned"),
                    Err(e) => tracing::warn!("View pruning failed: {}", e),
                }
                match notifications.delete_old(NOTIFICATION_RETENTION_DAYS).await {
                    Ok(removed) => tracing::info!(removed, "Old notifications pruned"),
                    Err(e) => tracing::warn!("Notification pruning failed: {}", e),
                }
                ai.content_generator()
                    .generator()
                    .clear_history(chrono::Duration::hours(DEFAULT_HISTORY_RETENTION_HOURS));
            }
        });
    }
}
