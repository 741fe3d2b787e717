use std::fmt;

use redis::RedisError;
use tracing::warn;

#[derive(Debug, PartialEq)]
pub enum Error {
    Backend(String),
    Serialization(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Backend(err) => write!(f, "Cache error: {err}"),
            Error::Serialization(err) => write!(f, "Cache encoding error: {err}"),
        }
    }
}

impl From<RedisError> for Error {
    fn from(error: RedisError) -> Self {
        warn!("Redis cache backend error: {error}");
        Error::Backend("Backend error".to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}
