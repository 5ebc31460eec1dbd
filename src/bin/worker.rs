use bulk_course_gen::{
    config::AppConfig,
    db::{self, PgStore},
    services::{
        generation::HttpGenerationClient,
        processor::{JobProcessor, ProcessorError, RunOutcome},
        queue::JobQueue,
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL_MS: u64 = 1000; // 1 second

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting bulk generation worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    if let Some(addr) = &config.worker_metrics_addr {
        let addr: SocketAddr = addr.parse().expect("Invalid WORKER_METRICS_ADDR");
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("Failed to install Prometheus exporter");
        tracing::info!(%addr, "Worker metrics listener started");
    }

    metrics::describe_histogram!(
        "bulk_task_generation_seconds",
        "Time to generate and persist one personalized course"
    );
    metrics::describe_counter!("bulk_tasks_completed_total", "Tasks that produced a course");
    metrics::describe_counter!("bulk_tasks_failed_total", "Tasks that ended in failure");
    metrics::describe_counter!("bulk_jobs_finished_total", "Jobs that reached a terminal state");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize services
    tracing::info!("Initializing services");
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");

    let backend = HttpGenerationClient::new(
        &config.generation_api_url,
        config.generation_api_key.as_deref(),
        config.generation_timeout(),
    )
    .expect("Failed to initialize generation client");

    let store = Arc::new(PgStore::new(db_pool));
    let processor = Arc::new(JobProcessor::new(
        store.clone(),
        store.clone(),
        store,
        Arc::new(backend),
        config.claim_lease(),
    ));

    match queue.recover_in_flight().await {
        Ok(0) => {}
        Ok(moved) => tracing::warn!(moved, "Re-queued jobs left in flight by a previous worker"),
        Err(e) => tracing::error!(error = %e, "Failed to recover in-flight jobs"),
    }

    tracing::info!("Worker ready, starting job processing loop");

    // Main processing loop
    loop {
        match process_next_job(&queue, &processor).await {
            Ok(true) => {
                tracing::debug!("Job processed, checking for next job");
            }
            Ok(false) => {
                tracing::trace!("No jobs available, sleeping");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing job, will retry");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        }
    }
}

/// Process the next job from the queue.
/// Returns Ok(true) if a job was handled, Ok(false) if no job available.
async fn process_next_job(
    queue: &JobQueue,
    processor: &Arc<JobProcessor>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let (job, payload) = match queue.dequeue().await? {
        Some(entry) => entry,
        None => return Ok(false),
    };

    tracing::info!(
        job_id = %job.job_id,
        queued_for_ms = (chrono::Utc::now() - job.enqueued_at).num_milliseconds(),
        "Processing bulk generation job"
    );

    match Arc::clone(processor).run_supervised(job.job_id).await {
        Ok(RunOutcome::Completed(progress)) => {
            tracing::info!(
                job_id = %job.job_id,
                completed = progress.completed,
                failed = progress.failed,
                "Job finished"
            );
        }
        Ok(RunOutcome::Failed { error }) => {
            tracing::warn!(job_id = %job.job_id, error = %error, "Job marked failed");
        }
        Ok(RunOutcome::Skipped) => {
            tracing::info!(job_id = %job.job_id, "Job skipped");
        }
        Ok(RunOutcome::Superseded) => {
            tracing::warn!(job_id = %job.job_id, "Job taken over by another worker");
        }
        Err(e @ ProcessorError::Claim { .. }) => {
            // The job is still pending; put it back for a later attempt.
            tracing::error!(job_id = %job.job_id, error = %e, "Could not claim job, re-queueing");
            queue.enqueue(&job).await?;
            queue.complete(&payload).await?;
            return Err(e.into());
        }
        Err(e) => {
            tracing::error!(job_id = %job.job_id, error = %e, "Job left unfinished");
        }
    }

    queue.complete(&payload).await?;
    Ok(true)
}
