//! Background worker process: leases batches off the queue and drives them
//! through the processor until stopped. Run several instances side by side
//! for parallelism — each gets its own worker id, all share one pool.

use clap::Parser;
use unified_events::configuration::get_configuration;
use unified_events::router::Router;
use unified_events::startup::get_connection_pool;
use unified_events::telemetry::get_subscriber;
use unified_events::telemetry::init_subscriber;
use unified_events::worker::Worker;
use unified_events::worker::WorkerConfig;

#[derive(Parser, Debug)]
#[command(name = "queue-processor")]
struct Args {
    /// Process one batch and exit, instead of looping forever.
    #[arg(long)]
    once: bool,

    /// Number of worker tasks to run concurrently in this process.
    #[arg(long, default_value_t = 1)]
    workers: u32,

    #[arg(long)]
    batch_size: Option<i64>,

    /// Seconds to sleep after finding an empty queue.
    #[arg(long)]
    sleep: Option<u64>,

    /// Exit after running this many seconds, even if `--once` isn't set.
    #[arg(long)]
    max_runtime: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("queue-processor", "info", std::io::stdout);
    init_subscriber(subscriber);

    let args = Args::parse();
    let cfg = get_configuration()?;
    let pool = get_connection_pool(&cfg.database);
    let router = Router::load(&pool).await?;

    let worker_cfg = WorkerConfig {
        batch_size: args.batch_size.unwrap_or(cfg.queue.batch_size),
        lease_seconds: cfg.queue.lease_seconds,
        sleep_on_empty: std::time::Duration::from_secs(args.sleep.unwrap_or(5)),
        once: args.once,
        max_runtime: args.max_runtime.map(std::time::Duration::from_secs),
        validation_daily_limit: cfg.validation.daily_limit,
    };

    let workers: Vec<Worker> = (0..args.workers.max(1)).map(|_| Worker::new(worker_cfg.clone())).collect();
    for worker in &workers {
        if !args.once {
            worker.spawn_shutdown_listener();
        }
    }

    let mut handles = Vec::new();
    for worker in workers {
        let pool = pool.clone();
        let router = router.clone();
        handles.push(tokio::spawn(async move { worker.run(&pool, &router).await }));
    }

    let mut had_error = false;
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::error!(%error, "worker exited with an error");
                had_error = true;
            }
            Err(error) => {
                tracing::error!(%error, "worker task panicked");
                had_error = true;
            }
        }
    }

    if had_error {
        std::process::exit(1);
    }
    Ok(())
}
