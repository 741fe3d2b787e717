use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::command;
use crate::command::server;
use crate::configuration::Configuration;

pub struct ConfigWatcher {
    _handle: tokio::task::JoinHandle<()>,
}

impl ConfigWatcher {
    pub fn new(config_path: &str, server: Arc<server::Command>) -> Result<Self, command::Error> {
        info!("Setting up config watcher for: {config_path}");

        let config_path = std::fs::canonicalize(PathBuf::from(config_path))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = watch_config_loop(config_path, server).await {
                error!("Config watcher failed: {e}");
            }
        });

        Ok(Self { _handle: handle })
    }
}

async fn watch_config_loop(
    config_path: PathBuf,
    server: Arc<server::Command>,
) -> Result<(), command::Error> {
    let (tx, mut rx) = mpsc::channel::<Event>(100);

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            let _ = tx.blocking_send(event);
        }
    })?;

    // Watching the parent directory survives editors that replace the file.
    let watched_dir = config_path.parent().unwrap_or(Path::new("."));
    watcher.watch(watched_dir, RecursiveMode::NonRecursive)?;

    while let Some(event) = rx.recv().await {
        let relevant = matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
        ) && event.paths.iter().any(|p| p == &config_path);

        if relevant {
            reload(&server, &config_path);
        }
    }

    warn!("Config watcher channel closed");
    Ok(())
}

fn reload(server: &server::Command, config_path: &Path) {
    info!("Configuration file changed, reloading");

    let config = match Configuration::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to reload configuration, keeping the current one: {e}");
            return;
        }
    };

    match server.notify_config_change(&config) {
        Ok(()) => info!("Configuration reloaded"),
        Err(e) => error!("Failed to apply new configuration: {e}"),
    }
}
