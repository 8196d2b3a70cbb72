//! Postline API Server

use postline_api::{AppState, routes};
use postline_config::SystemConfig;
use postline_db::{PgCredentialRepo, PgDraftRepo, create_pool, run_migrations};
use postline_publisher::{HttpMediaSource, LinkedInClient, PublishWorker, PublishWorkerConfig};
use postline_scheduler::{
    JobRunner, PgDelayQueue, Reconciler, RedisJobStore, RetryPolicy, Scheduler,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SystemConfig::from_env()?;

    // Create database pool
    info!("Connecting to database...");
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    info!("Database connected");

    info!("Connecting to job store...");
    let store = Arc::new(RedisJobStore::connect(&config.redis_url).await?);

    let queue = Arc::new(PgDelayQueue::new(pool.clone()));
    let drafts = Arc::new(PgDraftRepo::new(pool.clone()));
    let credentials = Arc::new(PgCredentialRepo::new(pool.clone()));

    let scheduler = Arc::new(Scheduler::new(
        queue.clone(),
        store.clone(),
        drafts.clone(),
        RetryPolicy {
            max_attempts: config.queue.max_attempts,
            backoff: config.queue.backoff(),
        },
    ));

    let worker = Arc::new(PublishWorker::new(
        drafts.clone(),
        credentials,
        Arc::new(LinkedInClient::new(
            config.linkedin.base_url.clone(),
            config.linkedin.version.clone(),
        )),
        Arc::new(HttpMediaSource::new()),
        store.clone(),
        PublishWorkerConfig {
            poll_interval: config.publisher.poll_interval(),
            poll_jitter: Duration::from_millis(config.publisher.poll_jitter_ms),
            poll_max_attempts: config.publisher.poll_max_attempts,
        },
    ));

    for n in 0..config.runner_count {
        let runner = JobRunner::new(
            format!("runner-{n}"),
            queue.clone(),
            config.queue.poll_interval(),
            Duration::from_millis(config.queue.poll_jitter_ms),
        )
        .register(worker.clone());
        tokio::spawn(async move { runner.run().await });
    }

    let reconciler = Reconciler::new(
        drafts,
        queue,
        store,
        config.reconciler.sweep_interval(),
        config.reconciler.stuck_after(),
    );
    tokio::spawn(async move { reconciler.run().await });

    // Build router
    let state = AppState::new(pool, scheduler);
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Starting server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
