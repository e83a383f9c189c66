use std::{
    env,
    fmt::{Display, Formatter},
    path::PathBuf,
};

use dotenvy::dotenv;
use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory holding `app.toml` and the per-environment overrides.
pub const CONFIG_DIR: &str = "config";

/// Process variables that are read without a prefix.
const RAW_ENV_KEYS: &[&str] = &[
    "ENVIRONMENT",
    "DEBUG",
    "LOG_LEVEL",
    "LOG_FORMAT",
    "LOG_DIR",
    "API_PORT",
    "COMMAND_PORT",
];

/// The query service settings.
///
/// A read-only snapshot that is loaded once before the service boots and handed to every
/// component that needs it. Values come from the main `app.toml`, the environment-specific
/// file and finally the process environment, so that defaults can be kept in `app.toml`
/// and overridden per deployment.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct Settings {
    /// The raw environment name, e.g. "production". See [`Settings::environment`].
    pub environment: String,

    /// Enables hot reload while developing.
    pub debug: bool,

    /// The default log level, e.g. "info" or "WARNING".
    pub log_level: String,

    /// The console and file log format: compact, full, pretty or json.
    pub log_format: String,

    /// Directory the production log file is written to.
    pub log_dir: PathBuf,

    /// The port the query API binds to, e.g. 2025
    pub api_port: u16,

    /// The port of the companion command service that accepts writes.
    pub command_port: u16,

    pub database: DatabaseConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::Development.to_string(),
            debug: false,
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
            log_dir: PathBuf::from("logs"),
            api_port: 2025,
            command_port: 3108,
            database: DatabaseConfig::default(),
        }
    }
}

impl Settings {
    /// Resolves the deployment profile from the raw environment name.
    pub fn environment(&self) -> Environment {
        Environment::resolve(&self.environment)
    }

    pub fn is_production(&self) -> bool {
        self.environment().is_production()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct DatabaseConfig {
    /// The URL to use to connect to the database, e.g. "sqlite://erp.db"
    pub url: String,
    /// Connections kept by the pool under normal load.
    pub pool_size: u32,
    /// Extra connections allowed on top of `pool_size` under burst load.
    pub max_overflow: u32,
    /// Seconds to wait for a connection before giving up.
    pub pool_timeout: u64,
    /// Seconds after which a connection is closed and replaced.
    pub pool_recycle: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://erp.db".to_string(),
            pool_size: 10,
            max_overflow: 20,
            pool_timeout: 30,
            pool_recycle: 3600,
        }
    }
}

/// Loads the service settings for a particular environment.
///
/// Depending on the environment, this function will behave differently:
/// * for [`Environment::Development`], the function will load env vars from a `.env` file at the project root if that is present
/// * for [`Environment::Production`], the function will only use the process env vars, and not load a `.env` file
///
/// In case the .env file lives in another directory,
/// you can set that location using the APP_DOTENV_CONFIG_DIR environment variable.
///
/// Settings are loaded from these sources (in that order so that latter sources override former):
/// * built-in defaults
/// * the `config/app.toml` file
/// * the `config/environments/<development|production>.toml` file depending on the environment
/// * the unprefixed variables `ENVIRONMENT`, `DEBUG`, `LOG_LEVEL`, `LOG_FORMAT`, `LOG_DIR`, `API_PORT`, `COMMAND_PORT` and `DATABASE_URL`
/// * `APP_` prefixed variables, using `__` to reach nested keys (e.g. `APP_DATABASE__POOL_SIZE`)
pub fn load_settings(env: &Environment) -> Result<Settings, Error> {
    let dotenv_config_dir = env::var("APP_DOTENV_CONFIG_DIR")
        .ok()
        .map(std::path::PathBuf::from);

    match (env, dotenv_config_dir) {
        (Environment::Development, None) => {
            dotenv().ok();
        }
        (Environment::Development, Some(mut dotenv_config_dir)) => {
            dotenv_config_dir.push(".env");
            dotenvy::from_filename(dotenv_config_dir).ok();
        }
        _ => { /* don't use any .env file for production */ }
    }

    let settings: Settings = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Serialized::default("environment", env.to_string()))
        .merge(Toml::file(format!("{CONFIG_DIR}/app.toml")))
        .merge(Toml::file(format!(
            "{CONFIG_DIR}/environments/{}.toml",
            env
        )))
        .merge(Env::raw().only(RAW_ENV_KEYS))
        .merge(
            Env::raw()
                .only(&["DATABASE_URL"])
                .map(|_| "database.url".into()),
        )
        .merge(Env::prefixed("APP_").split("__"))
        .extract()?;

    Ok(settings)
}

/// The deployment profile of the service.
///
/// Every environment-dependent decision (bind address, logging sinks, worker count,
/// header suppression) is derived from this value. It is resolved once at startup and
/// never changes for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Local development: loopback binding, colours, optional hot reload.
    Development,
    /// The released deployment: all interfaces, file logging, multiple workers.
    Production,
}

impl Environment {
    /// Resolves an environment name into a profile.
    ///
    /// Only "prod" and "production" select [`Environment::Production`]; any other value,
    /// including an unknown or empty one, resolves to [`Environment::Development`], which
    /// is the less exposed of the two.
    pub fn resolve(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "prod" | "production" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Returns the currently active environment.
///
/// If the `ENVIRONMENT` env var is set, the environment is resolved from it. If the env var is not set, [`Environment::Development`] is returned.
pub fn get_env() -> Environment {
    match env::var("ENVIRONMENT") {
        Ok(val) => {
            info!(r#"Setting environment from ENVIRONMENT: "{}""#, val);
            Environment::resolve(&val)
        }
        Err(_) => {
            info!("Defaulting to environment: development");
            Environment::Development
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Merge(#[from] figment::Error),
}
