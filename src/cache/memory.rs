use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;

use crate::cache::{Cache, Error};

const SWEEP_EVERY: usize = 1000;

#[derive(Debug)]
pub struct Backend {
    entries: RwLock<HashMap<String, (String, Instant)>>,
    operations: AtomicUsize,
}

impl Backend {
    pub fn new() -> Self {
        info!("Using in-memory cache");
        Backend {
            entries: RwLock::new(HashMap::new()),
            operations: AtomicUsize::new(0),
        }
    }

    async fn sweep_if_due(&self) {
        if self.operations.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY != 0 {
            return;
        }

        let now = Instant::now();
        self.entries
            .write()
            .await
            .retain(|_, (_, expires_at)| *expires_at > now);
    }
}

#[async_trait]
impl Cache for Backend {
    async fn store_value(&self, key: &str, value: &str, ttl: u64) -> Result<(), Error> {
        self.sweep_if_due().await;

        let expires_at = Instant::now() + Duration::from_secs(ttl);
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn retrieve_value(&self, key: &str) -> Result<Option<String>, Error> {
        self.sweep_if_due().await;

        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn delete_value(&self, key: &str) -> Result<(), Error> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
