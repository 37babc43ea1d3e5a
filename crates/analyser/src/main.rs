use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dbpulse_analyser::completion::CompletionListener;
use dbpulse_analyser::{AnalyserConfig, DetectionEngine, Pipeline, VerificationTracker};
use dbpulse_events::EventBus;
use dbpulse_knowledge::{KnowledgeStore, MemoryKnowledge, PgKnowledge};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dbpulse=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = AnalyserConfig::from_env();
    tracing::info!(
        verification_cycles = config.verification_cycles,
        audit_ttl_secs = config.audit_ttl_secs,
        "Loaded analyser configuration"
    );

    // --- Knowledge store ---
    let knowledge: Arc<dyn KnowledgeStore> = match &config.database_url {
        Some(database_url) => {
            let pool = dbpulse_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            dbpulse_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            dbpulse_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgKnowledge::new(
                pool,
                chrono::Duration::seconds(config.audit_ttl_secs),
            ))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory knowledge store");
            Arc::new(MemoryKnowledge::new(chrono::Duration::seconds(
                config.audit_ttl_secs,
            )))
        }
    };

    // --- Event bus ---
    let bus = Arc::new(EventBus::default());
    tracing::info!("Event bus created");

    // --- Engine, tracker, pipeline ---
    let engine = DetectionEngine::with_thresholds(&config.thresholds);
    let tracker = Arc::new(VerificationTracker::new(
        Arc::clone(&knowledge),
        Arc::clone(&bus),
        config.verification_cycles,
    ));
    let pipeline = Arc::new(Pipeline::new(
        engine,
        Arc::clone(&knowledge),
        Arc::clone(&bus),
        Arc::clone(&tracker),
    ));

    // --- Background tasks ---
    let cancel = tokio_util::sync::CancellationToken::new();

    let pipeline_handle = tokio::spawn(Arc::clone(&pipeline).run(bus.subscribe(), cancel.clone()));

    let completion_handle = tokio::spawn(CompletionListener::run(
        Arc::clone(&tracker),
        bus.subscribe(),
        cancel.clone(),
    ));

    let purge_handle = tokio::spawn(dbpulse_knowledge::purge::run(
        Arc::clone(&knowledge),
        Duration::from_secs(config.purge_interval_secs),
        cancel.clone(),
    ));

    tracing::info!("Analysis services started (pipeline, completion listener, audit purge)");

    // --- Shutdown ---
    shutdown_signal().await;

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), pipeline_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), completion_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), purge_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the service
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
