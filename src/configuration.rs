use config::Config;
use config::ConfigError;
use config::File;
use config::FileFormat;
use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub queue: QueueSettings,
    pub validation: ValidationSettings,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!("postgres://{}:{}@{}:{}/{}", self.username, self.password, self.host, self.port, self.database_name)
    }

    /// Connects to the server without selecting a database — used to `CREATE
    /// DATABASE` a randomised test database before migrating it.
    pub fn connection_string_without_db(&self) -> String {
        format!("postgres://{}:{}@{}:{}", self.username, self.password, self.host, self.port)
    }
}

/// Worker-side knobs, §6: `QUEUE_BATCH_SIZE` (default 100).
#[derive(Deserialize, Clone)]
pub struct QueueSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: i64,
}

fn default_batch_size() -> i64 { 100 }
fn default_lease_seconds() -> i64 { 300 }

/// §6: `VALIDATION_CACHE_DAYS` (default 30), `ZEROBOUNCE_DAILY_LIMIT`
/// (default 10000).
#[derive(Deserialize, Clone)]
pub struct ValidationSettings {
    #[serde(default = "default_cache_days")]
    pub cache_days: i64,
    #[serde(default = "default_daily_limit")]
    pub daily_limit: i32,
}

fn default_cache_days() -> i64 { 30 }
fn default_daily_limit() -> i32 { 10_000 }

/// Which of the layered config files to load, selected by `APP_ENVIRONMENT`.
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!("{other} is not a supported environment. Use `local` or `production`.")),
        }
    }
}

/// Layers `configuration/base.yaml`, then the environment-specific file,
/// then `APP_`-prefixed environment variables, last wins.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let base_path = std::env::current_dir().expect("failed to determine the current directory").join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".into()).try_into().map_err(ConfigError::Message)?;

    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = Config::builder()
        .add_source(File::from(base_path.join("base.yaml")))
        .add_source(File::from(base_path.join(environment_filename)).format(FileFormat::Yaml).required(false))
        .add_source(config::Environment::with_prefix("APP").prefix_separator("_").separator("__"))
        .build()?;

    settings.try_deserialize()
}
