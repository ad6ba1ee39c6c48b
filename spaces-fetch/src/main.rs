use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use spaces_fetch::api::{ApiServer, AppState};
use spaces_fetch::cache::ArtifactCache;
use spaces_fetch::config::AppConfig;
use spaces_fetch::downloader::YtDlpTool;
use spaces_fetch::jobs::{JobLogStore, JobRegistry};
use spaces_fetch::logging::{init_logging, install_panic_hook};
use spaces_fetch::pipeline::{Orchestrator, OrchestratorConfig};
use spaces_fetch::summarize::SummaryBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    let (logging_config, _log_guard) =
        init_logging(&config.storage.log_dir).context("Failed to initialize logging")?;
    install_panic_hook(&config.storage.log_dir);
    let cancel_token = CancellationToken::new();
    logging_config.start_retention_cleanup(cancel_token.clone());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        output_dir = %config.storage.output_dir.display(),
        job_log_dir = %config.storage.job_log_dir.display(),
        concurrency = config.queue.worker.concurrency,
        max_retries = config.queue.retry.max_retries,
        "Starting spaces-fetch"
    );

    let cache = ArtifactCache::new(&config.storage.output_dir);
    cache
        .ensure_output_dir()
        .await
        .context("Failed to create output directory")?;

    let registry = Arc::new(JobRegistry::new(JobLogStore::new(
        &config.storage.job_log_dir,
    )));
    let tool = Arc::new(YtDlpTool::new(config.fetch_tool.clone()));

    let summary = SummaryBackend::gemini(&config.summarizer)
        .context("Failed to initialize summarization client")?;
    if summary.is_none() {
        warn!("GOOGLE_API_KEY not set; summarization endpoints will return 503");
    }

    let orchestrator = Arc::new(Orchestrator::new(
        cache,
        registry,
        tool,
        summary,
        OrchestratorConfig {
            queue: config.queue.worker.clone(),
            retry: config.queue.retry.clone(),
            progress: config.progress.clone(),
        },
    ));

    let state = AppState::new(orchestrator.clone()).with_logging_config(logging_config.clone());
    let server = Arc::new(ApiServer::new(config.api.clone(), state));

    let server_task = {
        let server = server.clone();
        tokio::spawn(async move { server.run().await })
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");

    server.shutdown();
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "API server stopped with error"),
        Err(e) => error!(error = %e, "API server task panicked"),
    }

    orchestrator.shutdown().await;
    cancel_token.cancel();
    info!("spaces-fetch stopped");
    Ok(())
}
