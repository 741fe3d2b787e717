use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

mod error;
mod memory;
mod redis;

pub use error::Error;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Config {
    #[default]
    Memory,
    Redis(redis::BackendConfig),
}

impl Config {
    pub fn to_backend(&self) -> Result<Arc<dyn Cache>, Error> {
        match self {
            Config::Memory => Ok(Arc::new(memory::Backend::new())),
            Config::Redis(config) => Ok(Arc::new(redis::Backend::new(config)?)),
        }
    }
}

/// String key/value store with per-entry expiry, in seconds.
#[async_trait]
pub trait Cache: Debug + Send + Sync {
    async fn store_value(&self, key: &str, value: &str, ttl: u64) -> Result<(), Error>;
    async fn retrieve_value(&self, key: &str) -> Result<Option<String>, Error>;
    async fn delete_value(&self, key: &str) -> Result<(), Error>;
}

pub async fn store<T: Serialize + Sync>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: u64,
) -> Result<(), Error> {
    let value = serde_json::to_string(value)?;
    cache.store_value(key, &value, ttl).await
}

pub async fn retrieve<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Result<Option<T>, Error> {
    match cache.retrieve_value(key).await? {
        Some(value) => Ok(Some(serde_json::from_str(&value)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn memory_cache() -> Arc<dyn Cache> {
        Arc::new(memory::Backend::new())
    }

    #[test]
    fn test_config() {
        let config: Config = toml::from_str(
            r#"
            [redis]
            url = "redis://localhost:6379/1"
            "#,
        )
        .unwrap();
        assert!(matches!(config, Config::Redis(ref c) if c.url.ends_with("/1")));

        assert_eq!(Config::default(), Config::Memory);
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let cache = memory_cache();

        store(&*cache, "numbers", &vec![1, 2, 3], 60).await.unwrap();
        let numbers: Option<Vec<i32>> = retrieve(&*cache, "numbers").await.unwrap();
        assert_eq!(numbers, Some(vec![1, 2, 3]));

        let missing: Option<Vec<i32>> = retrieve(&*cache, "other").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_retrieve_garbage_fails() {
        let cache = memory_cache();

        cache.store_value("numbers", "not json", 60).await.unwrap();
        let result: Result<Option<Vec<i32>>, _> = retrieve(&*cache, "numbers").await;
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
