use std::{
    fmt::{Display, Formatter},
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

use erp_query_config::{Environment, Settings};

/// Worker threads used by the production runtime.
pub const PRODUCTION_WORKERS: usize = 4;

/// The option set handed to the server runtime.
///
/// Built fresh on every boot from the resolved [`Environment`] and the [`Settings`], and
/// never changed afterwards. The production tuning is present if and only if the
/// environment is production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRuntimeConfig {
    pub host: IpAddr,
    pub port: u16,
    pub reload: bool,
    pub log_level: String,
    pub access_log: bool,
    pub use_colors: bool,
    pub production: Option<ProductionTuning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionTuning {
    pub workers: usize,
    pub event_loop: EventLoop,
    pub http: HttpProtocol,
    /// Leave logging to the process subscriber instead of the runtime's own defaults.
    pub defer_log_config: bool,
    pub server_header: bool,
    pub date_header: bool,
}

/// The executor driving the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventLoop {
    /// A single-threaded tokio runtime.
    #[default]
    CurrentThread,
    /// A work-stealing tokio runtime with one thread per worker.
    MultiThread,
}

/// The connection handling used for incoming requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpProtocol {
    /// HTTP/1 and HTTP/2, detected per connection.
    #[default]
    Auto,
    /// A dedicated HTTP/1 connection loop.
    Http1,
}

impl Display for EventLoop {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            EventLoop::CurrentThread => write!(f, "current_thread"),
            EventLoop::MultiThread => write!(f, "multi_thread"),
        }
    }
}

impl Display for HttpProtocol {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            HttpProtocol::Auto => write!(f, "auto"),
            HttpProtocol::Http1 => write!(f, "http1"),
        }
    }
}

impl ServerRuntimeConfig {
    pub fn build(environment: Environment, settings: &Settings) -> Self {
        let production = environment.is_production();

        Self {
            host: if production {
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            } else {
                IpAddr::V4(Ipv4Addr::LOCALHOST)
            },
            port: settings.api_port,
            reload: settings.debug && !production,
            log_level: settings.log_level.to_lowercase(),
            access_log: true,
            use_colors: !production,
            production: production.then(ProductionTuning::default),
        }
    }

    /// Returns the address the server binds to.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn workers(&self) -> Option<usize> {
        self.production.as_ref().map(|tuning| tuning.workers)
    }

    pub fn event_loop(&self) -> EventLoop {
        self.production
            .as_ref()
            .map(|tuning| tuning.event_loop)
            .unwrap_or_default()
    }

    pub fn http(&self) -> HttpProtocol {
        self.production
            .as_ref()
            .map(|tuning| tuning.http)
            .unwrap_or_default()
    }

    pub fn defers_log_config(&self) -> bool {
        self.production
            .as_ref()
            .is_some_and(|tuning| tuning.defer_log_config)
    }

    pub fn server_header(&self) -> bool {
        self.production
            .as_ref()
            .is_none_or(|tuning| tuning.server_header)
    }

    pub fn date_header(&self) -> bool {
        self.production
            .as_ref()
            .is_none_or(|tuning| tuning.date_header)
    }

    /// Lists the options by name, in the order they are logged at startup.
    pub fn options(&self) -> Vec<(&'static str, String)> {
        let mut options = vec![
            ("host", self.host.to_string()),
            ("port", self.port.to_string()),
            ("reload", self.reload.to_string()),
            ("log_level", self.log_level.clone()),
            ("access_log", self.access_log.to_string()),
            ("use_colors", self.use_colors.to_string()),
        ];

        if let Some(tuning) = &self.production {
            options.extend([
                ("workers", tuning.workers.to_string()),
                ("loop", tuning.event_loop.to_string()),
                ("http", tuning.http.to_string()),
                ("log_config", (!tuning.defer_log_config).to_string()),
                ("server_header", tuning.server_header.to_string()),
                ("date_header", tuning.date_header.to_string()),
            ]);
        }

        options
    }
}

impl Default for ProductionTuning {
    fn default() -> Self {
        Self {
            workers: PRODUCTION_WORKERS,
            event_loop: EventLoop::MultiThread,
            http: HttpProtocol::Http1,
            defer_log_config: true,
            server_header: false,
            date_header: false,
        }
    }
}
