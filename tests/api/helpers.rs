use once_cell::sync::Lazy;
use sqlx::Connection;
use sqlx::Executor;
use sqlx::PgConnection;
use sqlx::PgPool;
use unified_events::configuration::get_configuration;
use unified_events::configuration::DatabaseSettings;
use unified_events::startup::get_connection_pool;
use unified_events::startup::Application;
use unified_events::telemetry::get_subscriber;
use unified_events::telemetry::init_subscriber;
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
    match std::env::var("TEST_LOG") {
        Ok(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::stdout);
            init_subscriber(subscriber);
        }
        Err(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::sink);
            init_subscriber(subscriber);
        }
    };
});

pub struct TestApp {
    pub addr: String,
    pub pool: PgPool,
}

impl TestApp {
    pub async fn post_lead(
        &self,
        body: &str,
    ) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/events/lead", self.addr))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body.to_string())
            .send()
            .await
            .expect("execute request")
    }

    pub async fn post_purchase(
        &self,
        body: &str,
    ) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/events/purchase", self.addr))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body.to_string())
            .send()
            .await
            .expect("execute request")
    }

    pub async fn get_health(&self) -> reqwest::Response {
        reqwest::Client::new().get(format!("{}/health", self.addr)).send().await.expect("execute request")
    }

    pub async fn get_stats(
        &self,
        api_key: &str,
    ) -> reqwest::Response {
        reqwest::Client::new().get(format!("{}/stats", self.addr)).header("X-API-Key", api_key).send().await.expect("execute request")
    }

    pub async fn insert_platform(
        &self,
        code: &str,
        platform_type: &str,
        base_url: &str,
        requires_valid_email: bool,
    ) -> i32 {
        let rec = sqlx::query!(
            r#"
            INSERT INTO platforms (platform_code, display_name, platform_type, is_active, api_config, max_retries, retry_delay_seconds, timeout_seconds, requires_valid_email, priority)
            VALUES ($1, $1, $2, true, jsonb_build_object('base_url', $3::text), 3, 1, 5, $4, 100)
            RETURNING id
            "#,
            code,
            platform_type,
            base_url,
            requires_valid_email,
        )
        .fetch_one(&self.pool)
        .await
        .expect("insert platform");
        rec.id
    }

    pub async fn insert_routing_rule(
        &self,
        event_type: &str,
        platform_id: i32,
    ) {
        sqlx::query!(
            r#"
            INSERT INTO routing_rules (event_type, platform_id, conditions, priority, is_active)
            VALUES ($1, $2, '{}'::jsonb, 100, true)
            "#,
            event_type,
            platform_id,
        )
        .execute(&self.pool)
        .await
        .expect("insert routing rule");
    }

    pub async fn insert_api_key(
        &self,
        raw_key: &str,
    ) {
        use sha2::Digest;
        let hash = hex::encode(sha2::Sha256::digest(raw_key.as_bytes()));
        sqlx::query!(r#"INSERT INTO api_keys (label, key_hash, is_active) VALUES ('test', $1, true)"#, hash).execute(&self.pool).await.expect("insert api key");
    }
}

async fn configure_database(cfg: &DatabaseSettings) -> PgPool {
    let mut conn = PgConnection::connect(&cfg.connection_string_without_db()).await.expect("postgres must be running");
    conn.execute(format!(r#"CREATE DATABASE "{}";"#, cfg.database_name).as_str()).await.expect("create test database");

    let pool = PgPool::connect(&cfg.connection_string()).await.expect("connect to test database");
    sqlx::migrate!().run(&pool).await.expect("run migrations");
    pool
}

pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    let cfg = {
        let mut cfg = get_configuration().expect("read configuration");
        cfg.database.database_name = Uuid::new_v4().to_string();
        cfg.application.port = 0;
        cfg
    };

    let _ = configure_database(&cfg.database).await;

    let app = Application::build(cfg.clone()).await.expect("build application");
    let addr = format!("http://localhost:{}", app.port());
    tokio::spawn(app.run_until_stopped());

    let pool = get_connection_pool(&cfg.database);

    TestApp { addr, pool }
}
