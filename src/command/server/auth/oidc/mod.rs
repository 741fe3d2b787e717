//! Verification of ID tokens issued by the configured OpenID Connect provider.

mod jwk;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, decode_header, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use jwk::JwkSet;

use crate::cache::{self, Cache};
use crate::command::server::error::Error;
use crate::configuration;
use crate::secret::Secret;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Issuer URL; discovery lives under `<endpoint>/.well-known/openid-configuration`.
    pub endpoint: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Secret<String>,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default = "Config::default_verify_cert")]
    pub verify_cert: bool,
    /// Claim holding the user's groups; no groups are read when unset.
    #[serde(default)]
    pub groups_claim: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// Skips discovery when set.
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(default = "Config::default_jwks_refresh_interval")]
    pub jwks_refresh_interval: u64,
    #[serde(default = "Config::default_clock_skew_tolerance")]
    pub clock_skew_tolerance: u64,
}

impl Config {
    fn default_verify_cert() -> bool {
        true
    }

    fn default_jwks_refresh_interval() -> u64 {
        3600
    }

    fn default_clock_skew_tolerance() -> u64 {
        60
    }

    pub fn issuer(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct Discovery {
    issuer: String,
    jwks_uri: String,
}

/// Identity asserted by a verified ID token.
#[derive(Clone, Debug, PartialEq)]
pub struct IdTokenClaims {
    pub subject: String,
    pub issuer: String,
    pub groups: Vec<String>,
}

pub struct Verifier {
    config: Config,
    client: Client,
    cache: Arc<dyn Cache>,
}

impl Verifier {
    pub fn new(config: &Config, cache: Arc<dyn Cache>) -> Result<Self, configuration::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(!config.verify_cert)
            .build()?;

        Ok(Self {
            config: config.clone(),
            client,
            cache,
        })
    }

    fn cache_key(&self, kind: &str) -> String {
        format!("oidc:{kind}:{}", self.config.issuer())
    }

    #[instrument(skip(self, token))]
    pub async fn verify(&self, token: &str) -> Result<IdTokenClaims, Error> {
        let header = decode_header(token)
            .map_err(|e| Error::Unauthorized(format!("malformed ID token: {e}")))?;

        let keys = self.key_set().await?;
        let key = keys.find(header.kid.as_deref()).ok_or_else(|| {
            Error::Unauthorized(format!("no provider key matches kid {:?}", header.kid))
        })?;
        if !key.accepts(header.alg) {
            return Err(Error::Unauthorized(format!(
                "algorithm {:?} does not fit the provider key",
                header.alg
            )));
        }

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.config.issuer()]);
        validation.set_audience(&[&self.config.client_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = self.config.clock_skew_tolerance;

        let data = decode::<HashMap<String, Value>>(token, &key.to_decoding_key()?, &validation)
            .map_err(|e| Error::Unauthorized(format!("ID token rejected: {e}")))?;
        let claims = data.claims;

        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let issuer = claims
            .get("iss")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let groups = self
            .config
            .groups_claim
            .as_deref()
            .and_then(|claim| claims.get(claim))
            .map(group_names)
            .unwrap_or_default();

        debug!("Verified ID token of '{subject}'");
        Ok(IdTokenClaims {
            subject,
            issuer,
            groups,
        })
    }

    async fn key_set(&self) -> Result<JwkSet, Error> {
        let key = self.cache_key("jwks");
        if let Ok(Some(keys)) = cache::retrieve::<JwkSet>(&*self.cache, &key).await {
            debug!("Using cached JWKS");
            return Ok(keys);
        }

        let jwks_uri = match &self.config.jwks_uri {
            Some(uri) => uri.clone(),
            None => self.discover().await?.jwks_uri,
        };

        let keys: JwkSet = self.fetch(&jwks_uri).await?;
        if let Err(error) =
            cache::store(&*self.cache, &key, &keys, self.config.jwks_refresh_interval).await
        {
            warn!("Unable to cache JWKS: {error}");
        }

        info!("Fetched JWKS from {jwks_uri}");
        Ok(keys)
    }

    async fn discover(&self) -> Result<Discovery, Error> {
        let key = self.cache_key("discovery");
        if let Ok(Some(discovery)) = cache::retrieve::<Discovery>(&*self.cache, &key).await {
            return Ok(discovery);
        }

        let url = format!("{}/.well-known/openid-configuration", self.config.issuer());
        let discovery: Discovery = self.fetch(&url).await?;

        if discovery.issuer.trim_end_matches('/') != self.config.issuer() {
            return Err(Error::Internal(format!(
                "provider announces issuer {} instead of {}",
                discovery.issuer,
                self.config.issuer()
            )));
        }

        if let Err(error) = cache::store(
            &*self.cache,
            &key,
            &discovery,
            self.config.jwks_refresh_interval,
        )
        .await
        {
            warn!("Unable to cache OIDC discovery document: {error}");
        }

        Ok(discovery)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Internal(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "request to {url} failed: HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("unexpected response from {url}: {e}")))
    }
}

fn group_names(value: &Value) -> Vec<String> {
    match value {
        Value::String(group) => vec![group.clone()],
        Value::Array(groups) => groups
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
