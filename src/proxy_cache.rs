//! Short-lived, single-use secrets that let the proxy-cache worker push
//! what it just pulled from upstream back into the local registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::metrics_provider::PROXY_CACHE_VERIFICATIONS;

const SECRET_LENGTH: usize = 8;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Seconds a secret stays valid.
    #[serde(default = "Config::default_secret_lifetime")]
    pub secret_lifetime: i64,
}

impl Config {
    fn default_secret_lifetime() -> i64 {
        15
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret_lifetime: Self::default_secret_lifetime(),
        }
    }
}

#[derive(Debug)]
struct Record {
    repository: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SecretManager {
    records: Mutex<HashMap<String, Record>>,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl SecretManager {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            lifetime: Duration::seconds(config.secret_lifetime),
            clock,
        }
    }

    pub fn generate(&self, repository: &str) -> String {
        let now = self.clock.now();
        let mut records = self.lock();
        records.retain(|_, record| record.expires_at > now);

        let secret = loop {
            let candidate: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(SECRET_LENGTH)
                .map(char::from)
                .collect();
            if !records.contains_key(&candidate) {
                break candidate;
            }
        };

        records.insert(
            secret.clone(),
            Record {
                repository: repository.to_string(),
                expires_at: now + self.lifetime,
            },
        );
        debug!("Generated proxy-cache secret for '{repository}'");

        secret
    }

    /// Consumes `secret` whatever the outcome.
    pub fn verify(&self, secret: &str, repository: &str) -> bool {
        let Some(record) = self.lock().remove(secret) else {
            PROXY_CACHE_VERIFICATIONS.with_label_values(&["unknown"]).inc();
            return false;
        };

        let result = if record.repository != repository {
            warn!(
                "Proxy-cache secret bound to '{}' presented for '{repository}'",
                record.repository
            );
            "mismatch"
        } else if self.clock.now() >= record.expires_at {
            debug!("Proxy-cache secret for '{repository}' expired");
            "expired"
        } else {
            "success"
        };

        PROXY_CACHE_VERIFICATIONS.with_label_values(&[result]).inc();
        result == "success"
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Record>> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
