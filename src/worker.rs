//! Long-running loop that pulls leased batches via the Queue and drives the
//! Processor, with graceful shutdown on SIGTERM/SIGINT.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use rand::Rng;
use sqlx::PgPool;

use crate::processor::Processor;
use crate::queue::Queue;
use crate::router::Router;

const YIELD_BETWEEN_BATCHES: StdDuration = StdDuration::from_millis(100);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub batch_size: i64,
    pub lease_seconds: i64,
    pub sleep_on_empty: StdDuration,
    pub once: bool,
    pub max_runtime: Option<StdDuration>,
    pub validation_daily_limit: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            lease_seconds: 300,
            sleep_on_empty: StdDuration::from_secs(5),
            once: false,
            max_runtime: None,
            validation_daily_limit: 10_000,
        }
    }
}

/// `host + pid + random`, unique per worker process (§4.8 step 1).
pub fn new_worker_id() -> String {
    let host = hostname().unwrap_or_else(|| "unknown-host".to_string());
    let pid = std::process::id();
    let salt: u32 = rand::thread_rng().gen();
    format!("{host}-{pid}-{salt:08x}")
}

fn hostname() -> Option<String> { std::env::var("HOSTNAME").ok() }

pub struct Worker {
    worker_id: String,
    config: WorkerConfig,
    stop: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(config: WorkerConfig) -> Self { Self { worker_id: new_worker_id(), config, stop: Arc::new(AtomicBool::new(false)) }}

    pub fn stop_flag(&self) -> Arc<AtomicBool> { Arc::clone(&self.stop) }

    #[tracing::instrument(skip_all, fields(worker_id = %self.worker_id))]
    pub async fn run(
        &self,
        pool: &PgPool,
        router: &Router,
    ) -> Result<(), anyhow::Error> {
        let started = tokio::time::Instant::now();
        tracing::info!(worker_id = %self.worker_id, "worker starting");

        loop {
            if self.stop.load(Ordering::SeqCst) {
                tracing::info!("stop requested, exiting worker loop");
                break;
            }
            if let Some(max_runtime) = self.config.max_runtime {
                if started.elapsed() >= max_runtime {
                    tracing::info!("max runtime reached, exiting worker loop");
                    break;
                }
            }

            let jobs = Queue::lease_batch(pool, &self.worker_id, self.config.batch_size, Some(self.config.lease_seconds)).await?;

            if jobs.is_empty() {
                if self.config.once {
                    break;
                }
                tokio::time::sleep(self.config.sleep_on_empty).await;
                continue;
            }

            for job in &jobs {
                if self.stop.load(Ordering::SeqCst) {
                    tracing::info!(job_id = job.id, "stop requested mid-batch, releasing remaining lease");
                    Queue::release(pool, job.id).await?;
                    continue;
                }
                if let Err(error) = Processor::execute_job(pool, router, job, self.config.validation_daily_limit).await {
                    tracing::error!(%error, job_id = job.id, "job execution failed unexpectedly");
                }
            }

            if self.config.once {
                break;
            }

            tokio::time::sleep(YIELD_BETWEEN_BATCHES).await;
        }

        Ok(())
    }

    /// Installs a task that flips the stop flag on SIGINT/SIGTERM.
    pub fn spawn_shutdown_listener(&self) {
        let stop = Arc::clone(&self.stop);
        tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(error) => {
                        tracing::warn!(%error, "failed to install SIGTERM handler");
                        let _ = ctrl_c.await;
                        stop.store(true, Ordering::SeqCst);
                        return;
                    }
                };
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = term.recv() => {},
                }
            }
            #[cfg(not(unix))]
            {
                let _ = ctrl_c.await;
            }
            stop.store(true, Ordering::SeqCst);
        });
    }
}
