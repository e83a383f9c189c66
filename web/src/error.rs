use std::path::PathBuf;

use color_eyre::eyre;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The configured log level is not one of the supported levels.
    #[error("invalid log level {0:?}, expected one of trace, debug, info, warning, error, critical")]
    InvalidLogLevel(String),
    /// The configured log format is not one of the supported formats.
    #[error("invalid log format {0:?}, expected one of compact, full, pretty, json")]
    InvalidLogFormat(String),
    /// The production log file or its directory could not be created.
    #[error("could not open log file {path:?}")]
    LogSink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The installed subscriber could not be reconfigured.
    #[error("could not reconfigure logging")]
    Reload(#[from] tracing_subscriber::reload::Error),
    /// The database did not answer the readiness probe.
    #[error("database health check failed")]
    Readiness,
    /// An error occured while interacting with the database.
    #[error("an error occured while interacting with the database")]
    Database(#[from] erp_query_db::Error),
    /// The server runtime stopped with a fault.
    #[error("server runtime failed: {0}")]
    Runtime(#[from] eyre::Error),
}
