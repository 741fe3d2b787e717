use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

mod error;
pub mod watcher;

pub use error::Error;

use crate::command::server::auth::{auth_proxy, oidc};
use crate::command::server::listeners::insecure;
use crate::secret::Secret;
use crate::store::memory;
use crate::{cache, proxy_cache, session, token};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    DbAuth,
    LdapAuth,
    HttpAuth,
    OidcAuth,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mode = match self {
            AuthMode::DbAuth => "db_auth",
            AuthMode::LdapAuth => "ldap_auth",
            AuthMode::HttpAuth => "http_auth",
            AuthMode::OidcAuth => "oidc_auth",
        };
        f.write_str(mode)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub auth_mode: AuthMode,
    #[serde(default)]
    pub ext_endpoint: Option<String>,
    #[serde(default = "Configuration::default_robot_name_prefix")]
    pub robot_name_prefix: String,
    #[serde(default)]
    pub internal_secrets: HashMap<String, Secret<String>>, // solution user name <-> shared secret
    #[serde(default)]
    pub server: insecure::Config,
    pub token: token::Config,
    #[serde(default)]
    pub proxy_cache: proxy_cache::Config,
    #[serde(default)]
    pub session: session::Config,
    #[serde(default)]
    pub cache: cache::Config,
    #[serde(default)]
    pub http_auth_proxy: Option<auth_proxy::Config>,
    #[serde(default)]
    pub oidc: Option<oidc::Config>,
    #[serde(default)]
    pub store: memory::Config,
    #[serde(default)]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub tracing: Option<TracingConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TracingConfig {
    pub endpoint: String,
    pub sampling_rate: f64,
}

impl Configuration {
    fn default_robot_name_prefix() -> String {
        "robot$".to_string()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_str = fs::read_to_string(path)?;
        Self::load_from_str(&config_str)
    }

    pub fn load_from_str(slice: &str) -> Result<Self, Error> {
        let config: Configuration = toml::from_str(slice)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.auth_mode == AuthMode::HttpAuth && self.http_auth_proxy.is_none() {
            return Err(Error::MissingSection(
                "http_auth_proxy is required with auth_mode = \"http_auth\"".to_string(),
            ));
        }

        if self.auth_mode == AuthMode::OidcAuth && self.oidc.is_none() {
            return Err(Error::MissingSection(
                "oidc is required with auth_mode = \"oidc_auth\"".to_string(),
            ));
        }

        if self.robot_name_prefix.is_empty() {
            return Err(Error::InvalidValue(
                "robot_name_prefix must not be empty".to_string(),
            ));
        }

        if self.token.expiration_minutes <= 0 {
            return Err(Error::InvalidValue(
                "token.expiration_minutes must be positive".to_string(),
            ));
        }

        if self.proxy_cache.secret_lifetime <= 0 {
            return Err(Error::InvalidValue(
                "proxy_cache.secret_lifetime must be positive".to_string(),
            ));
        }

        for robot in &self.store.robots {
            robot.validate().map_err(Error::InvalidValue)?;
        }

        Ok(())
    }

    /// The external endpoint without a trailing slash.
    pub fn ext_endpoint(&self) -> Option<&str> {
        self.ext_endpoint
            .as_deref()
            .map(|endpoint| endpoint.trim_end_matches('/'))
            .filter(|endpoint| !endpoint.is_empty())
    }
}
