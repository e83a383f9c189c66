use std::time::Duration;

use axum::{Router, serve};
use color_eyre::{Result, eyre};
use erp_query_config::{CONFIG_DIR, Settings};
use hyper::server::conn::http1;
use hyper_util::{rt::TokioIo, server::graceful::GracefulShutdown, service::TowerToHyperService};
use tokio::{
    net::TcpListener,
    runtime::{self, Runtime},
    signal,
    sync::{mpsc, oneshot},
};
use tracing::{debug, error, info, warn};

use crate::{
    reload::ConfigWatcher,
    router::init_router,
    server::{EventLoop, HttpProtocol, ServerRuntimeConfig},
    state::AppState,
};

/// How a server run ended.
#[derive(Debug)]
pub enum ServeOutcome {
    /// The server stopped on its own.
    Completed,
    /// An interrupt or terminate signal drained the server.
    Interrupted,
    /// A configuration file changed while hot reload was enabled.
    Reload,
    /// The server could not start or failed while running.
    Faulted(eyre::Report),
}

/// The engine that serves requests once the bootstrap has finished.
pub trait ServerRuntime {
    /// Runs the server to completion, blocking the calling thread.
    fn run(&self, settings: &Settings, config: ServerRuntimeConfig) -> ServeOutcome;
}

/// Serves the query API with axum on a tokio runtime shaped by the [`ServerRuntimeConfig`].
pub struct AxumRuntime;

impl ServerRuntime for AxumRuntime {
    fn run(&self, settings: &Settings, config: ServerRuntimeConfig) -> ServeOutcome {
        let runtime = match build_runtime(&config) {
            Ok(runtime) => runtime,
            Err(err) => {
                return ServeOutcome::Faulted(
                    eyre::Report::new(err).wrap_err("could not start the tokio runtime"),
                );
            }
        };

        match runtime.block_on(AxumRuntime::serve(settings.clone(), config)) {
            Ok(outcome) => outcome,
            Err(report) => ServeOutcome::Faulted(report),
        }
    }
}

impl AxumRuntime {
    // Serves the application on the configured
    // ip and port until a stop signal arrives.
    async fn serve(settings: Settings, config: ServerRuntimeConfig) -> Result<ServeOutcome> {
        let app_state = AppState::build(settings).await?;
        let router = init_router(&app_state, &config);
        let listener = TcpListener::bind(config.addr()).await?;

        debug!("listening on {}", config.addr());

        let (reload_tx, reload_rx) = mpsc::unbounded_channel();
        let _watcher = if config.reload {
            match ConfigWatcher::new(CONFIG_DIR).run(reload_tx) {
                Ok(watcher) => Some(watcher),
                Err(err) => {
                    warn!("hot reload disabled, cannot watch {CONFIG_DIR}: {err}");
                    None
                }
            }
        } else {
            drop(reload_tx);
            None
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let shutdown = async move {
            let _ = stop_tx.send(stop_signal(reload_rx).await);
        };

        match config.http() {
            HttpProtocol::Auto => {
                serve(listener, router)
                    .with_graceful_shutdown(shutdown)
                    .await?
            }
            HttpProtocol::Http1 => serve_http1(listener, router, &config, shutdown).await?,
        }

        app_state.db_pool.close().await;

        let outcome = match stop_rx.await {
            Ok(StopReason::Interrupt) => ServeOutcome::Interrupted,
            Ok(StopReason::Reload) => ServeOutcome::Reload,
            Err(_) => ServeOutcome::Completed,
        };

        Ok(outcome)
    }
}

fn build_runtime(config: &ServerRuntimeConfig) -> std::io::Result<Runtime> {
    let mut builder = match config.event_loop() {
        EventLoop::CurrentThread => runtime::Builder::new_current_thread(),
        EventLoop::MultiThread => runtime::Builder::new_multi_thread(),
    };

    if let Some(workers) = config.workers() {
        builder.worker_threads(workers);
    }

    builder.enable_all().build()
}

/// Accepts HTTP/1 connections until `shutdown` resolves, then drains the open ones.
///
/// The `date` header is only written when `config` allows it.
pub async fn serve_http1<F>(
    listener: TcpListener,
    router: Router,
    config: &ServerRuntimeConfig,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    let mut builder = http1::Builder::new();
    builder.auto_date_header(config.date_header());
    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        back_off_after_accept_error(&err).await;
                        continue;
                    }
                };

                let service = TowerToHyperService::new(router.clone());
                let connection = graceful.watch(builder.serve_connection(TokioIo::new(stream), service));

                tokio::spawn(async move {
                    if let Err(err) = connection.await {
                        debug!(%remote_addr, "connection closed with error: {err}");
                    }
                });
            }
            _ = &mut shutdown => break,
        }
    }

    drop(listener);
    graceful.shutdown().await;

    Ok(())
}

/// Pause after a failed accept, matching `axum::serve`.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

// Errors such as EMFILE persist until a descriptor frees up.
async fn back_off_after_accept_error(err: &std::io::Error) {
    warn!("failed to accept connection: {err}");
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Interrupt,
    Reload,
}

async fn stop_signal(mut reload: mpsc::UnboundedReceiver<()>) -> StopReason {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    // Without a watcher the sender is gone and `recv` returns `None` straight away.
    let config_change = async {
        if reload.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("interrupt received");
            StopReason::Interrupt
        },
        _ = terminate => {
            info!("terminate signal received");
            StopReason::Interrupt
        },
        _ = config_change => StopReason::Reload,
    }
}
