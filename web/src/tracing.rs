use std::{
    fs::{self, File, OpenOptions},
    path::PathBuf,
    str::FromStr,
    sync::{Mutex, OnceLock},
};

use erp_query_config::{Environment, Settings};
use tracing::Level;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    filter::LevelFilter,
    fmt,
    fmt::MakeWriter,
    layer::{Layered, SubscriberExt},
    reload,
    util::SubscriberInitExt,
};

use crate::error::Error;

/// Name of the production log file inside the configured log directory.
pub const LOG_FILE: &str = "query_service.log";

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;

pub type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Sync + Send>;

/// Handles to the filter and the sinks of the installed subscriber.
struct ReloadHandles {
    filter: reload::Handle<EnvFilter, Registry>,
    sinks: reload::Handle<Vec<BoxedLayer>, FilteredRegistry>,
}

static RELOAD: OnceLock<ReloadHandles> = OnceLock::new();

/// Output formats for every log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Full,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(Error::InvalidLogFormat(s.to_string())),
        }
    }
}

/// Parses a configured log level.
///
/// Accepts the tracing level names plus "warning" and "critical", in any case.
pub fn parse_level(level: &str) -> Result<Level, Error> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" | "critical" => Ok(Level::ERROR),
        _ => Err(Error::InvalidLogLevel(level.to_string())),
    }
}

pub struct Tracing;

impl Tracing {
    /// Installs the process-wide subscriber.
    ///
    /// Validates the level and format before touching anything, so a bad setting is
    /// reported before the first log line. Calling this again swaps the filter and the
    /// sinks of the installed subscriber for ones built from `settings`.
    pub fn init(environment: Environment, settings: &Settings) -> Result<(), Error> {
        let level = parse_level(&settings.log_level)?;
        let layers = Self::sinks(environment, settings)?;
        let filter = init_env_layer(level);

        if let Some(handles) = RELOAD.get() {
            handles.sinks.reload(layers)?;
            handles.filter.reload(filter)?;
            tracing::debug!("tracing reconfigured");
            return Ok(());
        }

        let (filter, filter_handle) = reload::Layer::new(filter);
        let (sinks, sinks_handle) = reload::Layer::new(layers);

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(sinks)
            .with(ErrorLayer::default())
            .try_init();

        match installed {
            Ok(()) => {
                let _ = RELOAD.set(ReloadHandles {
                    filter: filter_handle,
                    sinks: sinks_handle,
                });
            }
            Err(_) => {
                tracing::debug!("another subscriber is already installed, keeping it");
            }
        }

        Ok(())
    }

    /// Builds the log sinks for a profile: the console always, plus the log file in
    /// production.
    pub fn sinks(environment: Environment, settings: &Settings) -> Result<Vec<BoxedLayer>, Error> {
        let format: LogFormat = settings.log_format.parse()?;
        let mut layers: Vec<BoxedLayer> = Vec::new();

        layers.push(fmt_layer(
            format,
            !environment.is_production(),
            std::io::stdout,
        ));

        if environment.is_production() {
            let file = open_log_file(settings.log_dir.join(LOG_FILE))?;
            layers.push(fmt_layer(format, false, Mutex::new(file)));
        }

        Ok(layers)
    }
}

fn fmt_layer<W>(format: LogFormat, ansi: bool, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::Layer::default().with_ansi(ansi).with_writer(writer);

    match format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Full => layer.boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn open_log_file(path: PathBuf) -> Result<File, Error> {
    let to_sink_error = |source| Error::LogSink {
        path: path.clone(),
        source,
    };

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(to_sink_error)?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(to_sink_error)
}

fn init_env_layer(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}
