//! Operator tool: re-queues failed jobs that haven't exhausted their retry
//! budget, scoped by age window, platform, and count.

use chrono::Duration;
use clap::Parser;
use unified_events::configuration::get_configuration;
use unified_events::queue::Queue;
use unified_events::startup::get_connection_pool;
use unified_events::telemetry::get_subscriber;
use unified_events::telemetry::init_subscriber;

#[derive(Parser, Debug)]
#[command(name = "retry-failed")]
struct Args {
    /// Only consider jobs that failed within this many hours.
    #[arg(long, default_value_t = 24)]
    hours: i64,

    /// Restrict to a single platform code.
    #[arg(long)]
    platform: Option<String>,

    /// Cap on how many jobs get retried this run.
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("retry-failed", "info", std::io::stdout);
    init_subscriber(subscriber);

    let args = Args::parse();
    let cfg = get_configuration()?;
    let pool = get_connection_pool(&cfg.database);

    if args.dry_run {
        tracing::info!(hours = args.hours, platform = ?args.platform, limit = ?args.limit, "dry-run: would retry matching failed jobs");
        return Ok(());
    }

    match Queue::retry_failed(&pool, Duration::hours(args.hours), args.platform.as_deref(), args.limit).await {
        Ok(retried) => {
            tracing::info!(retried, "retried failed jobs");
            Ok(())
        }
        Err(error) => {
            tracing::error!(%error, "retry-failed run failed");
            std::process::exit(1);
        }
    }
}
