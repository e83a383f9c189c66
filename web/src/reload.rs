use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watches the configuration directory and reports changes to `.toml` files.
pub struct ConfigWatcher {
    path: PathBuf,
}

impl ConfigWatcher {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Starts watching in a background thread.
    ///
    /// One message is sent on `changes` per relevant event. The returned watcher must be
    /// kept alive for as long as changes should be reported.
    pub fn run(self, changes: mpsc::UnboundedSender<()>) -> Result<RecommendedWatcher, notify::Error> {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_config_change(&event) => {
                    tracing::info!(paths = ?event.paths, "configuration change detected");
                    let _ = changes.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!("watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::Recursive)?;

        tracing::info!(path = ?self.path, "config watcher started");
        Ok(watcher)
    }
}

fn is_config_change(event: &Event) -> bool {
    let touches_toml = event
        .paths
        .iter()
        .any(|path| path.extension().is_some_and(|ext| ext == "toml"));

    touches_toml && (event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove())
}
