//! Maintenance sweep: reclaims stuck leases, prunes old terminal rows, and
//! rolls up daily analytics. Meant to run from cron.

use chrono::Duration;
use clap::Parser;
use clap::ValueEnum;
use sqlx::PgPool;
use unified_events::configuration::get_configuration;
use unified_events::queue::Queue;
use unified_events::startup::get_connection_pool;
use unified_events::telemetry::get_subscriber;
use unified_events::telemetry::init_subscriber;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Task {
    Queue,
    Stuck,
    Logs,
    Ratelimit,
    Archive,
    Optimize,
    Analytics,
    All,
}

#[derive(Parser, Debug)]
#[command(name = "cleanup")]
struct Args {
    #[arg(long, value_enum, default_value_t = Task::All)]
    task: Task,

    #[arg(long)]
    dry_run: bool,

    #[arg(long, default_value_t = 30)]
    days: i64,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("cleanup", "info", std::io::stdout);
    init_subscriber(subscriber);

    let args = Args::parse();
    let cfg = get_configuration()?;
    let pool = get_connection_pool(&cfg.database);

    let result = match args.task {
        Task::Queue => run_queue(&pool, args.days, args.dry_run).await,
        Task::Stuck => run_stuck(&pool, args.dry_run).await,
        Task::Logs => run_logs(&pool, args.days, args.dry_run).await,
        Task::Ratelimit => run_ratelimit(&pool, args.days, args.dry_run).await,
        Task::Archive => run_archive(args.dry_run).await,
        Task::Optimize => run_optimize(&pool, args.dry_run).await,
        Task::Analytics => run_analytics(&pool, args.dry_run).await,
        Task::All => run_all(&pool, args.days, args.dry_run).await,
    };

    match result {
        Ok(()) => Ok(()),
        Err(error) => {
            tracing::error!(%error, "cleanup task failed");
            std::process::exit(1);
        }
    }
}

async fn run_all(
    pool: &PgPool,
    days: i64,
    dry_run: bool,
) -> Result<(), anyhow::Error> {
    run_stuck(pool, dry_run).await?;
    run_queue(pool, days, dry_run).await?;
    run_logs(pool, days, dry_run).await?;
    run_ratelimit(pool, days, dry_run).await?;
    run_archive(dry_run).await?;
    run_analytics(pool, dry_run).await?;
    run_optimize(pool, dry_run).await?;
    Ok(())
}

async fn run_queue(
    pool: &PgPool,
    days: i64,
    dry_run: bool,
) -> Result<(), anyhow::Error> {
    if dry_run {
        tracing::info!(days, "dry-run: would delete terminal processing_queue rows older than this");
        return Ok(());
    }
    let removed = Queue::cleanup(pool, Duration::days(days)).await?;
    tracing::info!(removed, "cleaned up terminal queue rows");
    Ok(())
}

async fn run_stuck(
    pool: &PgPool,
    dry_run: bool,
) -> Result<(), anyhow::Error> {
    let grace = Duration::minutes(10);
    if dry_run {
        tracing::info!("dry-run: would reap leases stuck past their grace period");
        return Ok(());
    }
    let reaped = Queue::reap_stuck(pool, grace).await?;
    tracing::info!(reaped, "reaped stuck leases");
    Ok(())
}

async fn run_logs(
    pool: &PgPool,
    days: i64,
    dry_run: bool,
) -> Result<(), anyhow::Error> {
    if dry_run {
        tracing::info!(days, "dry-run: would delete processing_log rows older than this");
        return Ok(());
    }
    let result = sqlx::query!(r#"DELETE FROM processing_log WHERE created_at < now() - ($1 || ' days')::interval"#, days.to_string())
        .execute(pool)
        .await?;
    tracing::info!(removed = result.rows_affected(), "pruned processing_log");
    Ok(())
}

async fn run_ratelimit(
    pool: &PgPool,
    days: i64,
    dry_run: bool,
) -> Result<(), anyhow::Error> {
    if dry_run {
        tracing::info!(days, "dry-run: would delete validation_daily_counters rows older than this");
        return Ok(());
    }
    let result = sqlx::query!(r#"DELETE FROM validation_daily_counters WHERE day < (now() - ($1 || ' days')::interval)::date"#, days.to_string())
        .execute(pool)
        .await?;
    tracing::info!(removed = result.rows_affected(), "pruned validation_daily_counters");
    Ok(())
}

/// No archive table exists yet; this is a placeholder until one does.
async fn run_archive(dry_run: bool) -> Result<(), anyhow::Error> {
    if dry_run {
        tracing::info!("dry-run: archive task has nothing to do yet");
    } else {
        tracing::info!("archive task is a no-op (no archive store configured)");
    }
    Ok(())
}

async fn run_optimize(
    pool: &PgPool,
    dry_run: bool,
) -> Result<(), anyhow::Error> {
    if dry_run {
        tracing::info!("dry-run: would VACUUM ANALYZE processing_queue, events, processing_log");
        return Ok(());
    }
    sqlx::query!("VACUUM ANALYZE processing_queue").execute(pool).await?;
    sqlx::query!("VACUUM ANALYZE events").execute(pool).await?;
    sqlx::query!("VACUUM ANALYZE processing_log").execute(pool).await?;
    tracing::info!("vacuumed core tables");
    Ok(())
}

async fn run_analytics(
    pool: &PgPool,
    dry_run: bool,
) -> Result<(), anyhow::Error> {
    if dry_run {
        tracing::info!("dry-run: would roll up yesterday's counts into analytics_daily");
        return Ok(());
    }
    sqlx::query!(
        r#"
        INSERT INTO analytics_daily (day, event_type, total_events, total_revenue)
        SELECT date_trunc('day', created_at)::date, event_type, count(*), 0
        FROM events
        WHERE created_at >= now() - interval '1 day'
        GROUP BY 1, 2
        ON CONFLICT (day, event_type) DO UPDATE
        SET total_events = excluded.total_events
        "#,
    )
    .execute(pool)
    .await?;
    tracing::info!("rolled up analytics_daily");
    Ok(())
}
