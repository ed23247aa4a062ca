//! Upload and ingestion service.
//!
//! Configuration: `INGEST_CONFIG` may point at a JSON file; `INGEST_*` variables (also read from
//! `.env`) override it. Logging follows `RUST_LOG` (default `info`).

use std::sync::Arc;

use tabular_ingest::config::PipelineConfig;
use tabular_ingest::execution::{TracingWorkerObserver, WorkerObserver, WorkerPool};
use tabular_ingest::object_store::{LocalObjectStore, ObjectStore};
use tabular_ingest::pipeline::{FileStager, PipelineOrchestrator, UploadIntake};
use tabular_ingest::store::TaskStateStore;
use tabular_ingest::submission::{IngestionJobApi, OverlordClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let base = match std::env::var("INGEST_CONFIG") {
        Ok(path) => PipelineConfig::from_json_file(path)?,
        Err(_) => PipelineConfig::default(),
    };
    let config = base.with_overrides(|key| std::env::var(format!("INGEST_{key}")).ok())?;
    tracing::info!(?config, "starting ingest server");

    let store = Arc::new(TaskStateStore::open(&config.database_path)?);
    let stuck = store.count_by_status()?;
    tracing::info!(?stuck, "task counts at startup");

    let objects: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(&config.upload_dir)?);
    let jobs: Arc<dyn IngestionJobApi> = Arc::new(OverlordClient::new(config.overlord_url.clone())?);

    let orchestrator = PipelineOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&objects),
        jobs,
        FileStager::new(&config.shared_dir),
    )
    .with_validation(config.validation_service())
    .with_inference(config.inference_engine())
    .with_spec_builder(config.spec_builder())
    .with_monitor(config.job_monitor())
    .with_forced_fallback(config.force_fallback_spec);

    let observer: Arc<dyn WorkerObserver> = Arc::new(TracingWorkerObserver);
    let pool = Arc::new(WorkerPool::start_with_observer(
        Arc::new(orchestrator),
        config.worker_options(),
        Some(observer),
    ));

    let intake = UploadIntake::new(store, objects, Arc::clone(&pool));
    let app = tabular_ingest::http::router(intake, config.max_file_size);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("shutting down workers");
    pool.shutdown().await;
    Ok(())
}
