use std::sync::{Arc, Mutex, MutexGuard};

use argh::FromArgs;
use tracing::info;

use crate::cache::{self, Cache};
use crate::clock::{Clock, SystemClock};
use crate::command::server::error::Error;
use crate::command::server::listeners::insecure::InsecureListener;
use crate::command::server::server_context::SharedState;
use crate::command::server::ServerContext;
use crate::configuration::Configuration;
use crate::proxy_cache::SecretManager;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "server",
    description = "Run the authorization service"
)]
pub struct Options {}

pub struct Command {
    listener: InsecureListener,
    shared: Mutex<(cache::Config, SharedState)>,
}

fn build_cache(config: &cache::Config) -> Result<Arc<dyn Cache>, Error> {
    config
        .to_backend()
        .map_err(|err| Error::Initialization(format!("Failed to initialize cache: {err}")))
}

impl Command {
    pub fn new(config: &Configuration) -> Result<Command, Error> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let shared = SharedState {
            cache: build_cache(&config.cache)?,
            proxy_cache_secrets: Arc::new(SecretManager::new(&config.proxy_cache, clock.clone())),
            clock,
        };

        let context = ServerContext::new(config, &shared)?;
        let listener = InsecureListener::new(&config.server, context);

        Ok(Command {
            listener,
            shared: Mutex::new((config.cache.clone(), shared)),
        })
    }

    fn shared(&self) -> MutexGuard<'_, (cache::Config, SharedState)> {
        self.shared
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Rebuilds the server context. Sessions and cached discovery documents
    /// survive as long as the cache section is unchanged; issued proxy-cache
    /// secrets always do.
    pub fn notify_config_change(&self, config: &Configuration) -> Result<(), Error> {
        let mut guard = self.shared();
        let (cache_config, shared) = &mut *guard;

        let mut next = shared.clone();
        if *cache_config != config.cache {
            info!("Cache configuration changed, switching backend");
            next.cache = build_cache(&config.cache)?;
        }

        let context = ServerContext::new(config, &next)?;
        self.listener.notify_config_change(&config.server, context);

        *cache_config = config.cache.clone();
        *shared = next;
        Ok(())
    }

    pub async fn run(&self) -> Result<(), Error> {
        self.listener.serve().await
    }
}
