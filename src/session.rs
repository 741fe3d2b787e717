//! Browser sessions backing the cookie issued by the login endpoint.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{self, Cache};
use crate::store::User;

const KEY_PREFIX: &str = "session:";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_cookie_name")]
    pub cookie_name: String,
    /// Seconds of validity for a freshly created session.
    #[serde(default = "Config::default_ttl")]
    pub ttl: u64,
}

impl Config {
    fn default_cookie_name() -> String {
        "sid".to_string()
    }

    fn default_ttl() -> u64 {
        1800
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cookie_name: Self::default_cookie_name(),
            ttl: Self::default_ttl(),
        }
    }
}

/// Maps opaque session ids to the user that logged in.
#[derive(Debug)]
pub struct Sessions {
    cache: Arc<dyn Cache>,
    cookie_name: String,
    ttl: u64,
}

impl Sessions {
    pub fn new(config: &Config, cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            cookie_name: config.cookie_name.clone(),
            ttl: config.ttl,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub async fn create(&self, user: &User) -> Result<String, cache::Error> {
        let id = Uuid::new_v4().simple().to_string();
        cache::store(&*self.cache, &format!("{KEY_PREFIX}{id}"), user, self.ttl).await?;
        debug!("Created session for '{}'", user.username);
        Ok(id)
    }

    pub async fn load(&self, id: &str) -> Result<Option<User>, cache::Error> {
        cache::retrieve(&*self.cache, &format!("{KEY_PREFIX}{id}")).await
    }

    pub async fn destroy(&self, id: &str) -> Result<(), cache::Error> {
        self.cache.delete_value(&format!("{KEY_PREFIX}{id}")).await
    }
}
