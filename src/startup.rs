use std::net::TcpListener;

use actix_web::dev::Server;
use actix_web::web;
use actix_web::App;
use actix_web::HttpServer;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_actix_web::TracingLogger;

use crate::configuration::DatabaseSettings;
use crate::configuration::Settings;
use crate::router::Router;
use crate::routes::health_check;
use crate::routes::stats;
use crate::routes::submit_lead;
use crate::routes::submit_purchase;
use crate::validator::Validator;
use crate::validator::ValidatorConfig;

/// Everything a request handler needs, constructed once at startup and
/// shared via `web::Data` across every worker thread actix spins up.
pub struct AppState {
    pub pool: PgPool,
    pub router: Router,
    pub validator: Validator,
    pub settings: Settings,
}

/// Wrapper around actix's `Server` that keeps the bound port reachable for
/// tests, the same split the background worker binaries don't need.
pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(cfg: Settings) -> Result<Self, anyhow::Error> {
        let addr = format!("{}:{}", cfg.application.host, cfg.application.port);
        let listener = TcpListener::bind(addr)?;
        let port = listener.local_addr()?.port();

        let pool = get_connection_pool(&cfg.database);
        let router = Router::load(&pool).await?;
        let validator = Validator::new(ValidatorConfig {
            email_cache_ttl: chrono::Duration::days(cfg.validation.cache_days),
            ..ValidatorConfig::default()
        });

        let server = run(listener, pool, router, validator, cfg)?;
        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 { self.port }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> { self.server.await }
}

pub fn get_connection_pool(db_cfg: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new().connect_lazy(&db_cfg.connection_string()).expect("failed to build the database connection pool")
}

pub fn run(
    listener: TcpListener,
    pool: PgPool,
    router: Router,
    validator: Validator,
    settings: Settings,
) -> Result<Server, anyhow::Error> {
    let state = web::Data::new(AppState { pool, router, validator, settings });

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/events/lead", web::post().to(submit_lead))
            .route("/events/purchase", web::post().to(submit_purchase))
            .route("/health", web::get().to(health_check))
            .route("/stats", web::get().to(stats))
            .app_data(state.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
