//! Credential generators: each inspects a request and either recognizes a
//! credential it owns, yielding a principal, or steps aside.

pub mod auth_proxy;
mod basic_auth;
mod id_token;
mod internal_secret;
mod middleware;
pub mod oidc;
mod oidc_cli;
mod proxy_cache_secret;
pub mod robot;
mod session;
mod v2_token;


use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::http::request::Parts;
use tracing::warn;

pub use basic_auth::{Authenticator, LocalAuthenticator};
pub use middleware::SecurityMiddleware;

use crate::clock::Clock;
use crate::configuration::{self, AuthMode, Configuration};
use crate::metrics_provider::AUTH_ATTEMPTS;
use crate::proxy_cache::SecretManager;
use crate::security::Principal;
use crate::session::Sessions;
use crate::store::Stores;
use crate::token::TokenSigner;

/// What a generator gets to look at.
pub struct AuthRequest<'a> {
    pub parts: &'a Parts,
    pub auth_mode: AuthMode,
}

impl AuthRequest<'_> {
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn is_registry_path(&self) -> bool {
        let path = self.path();
        path == "/v2" || path.starts_with("/v2/")
    }

    pub fn is_token_path(&self) -> bool {
        self.path() == "/service/token"
    }

    pub fn is_api_path(&self) -> bool {
        self.path().starts_with("/api/")
    }
}

#[async_trait]
pub trait CredentialGenerator: Send + Sync {
    /// Label used in logs, metrics and the `auth_method` span field.
    fn name(&self) -> &'static str;

    /// `None` when the request carries no credential of this kind, or one that does not verify.
    async fn generate(&self, request: &AuthRequest<'_>) -> Option<Principal>;
}

/// A credential of the generator's kind was presented but did not verify.
fn rejected(method: &'static str, reason: impl Display) -> Option<Principal> {
    warn!("{method} authentication rejected: {reason}");
    AUTH_ATTEMPTS.with_label_values(&[method, "failed"]).inc();
    None
}

/// Shared services the generators draw on.
pub struct Dependencies {
    pub stores: Stores,
    pub signer: Arc<TokenSigner>,
    pub authenticator: Arc<dyn Authenticator>,
    pub sessions: Arc<Sessions>,
    pub proxy_cache_secrets: Arc<SecretManager>,
    pub oidc: Option<Arc<oidc::Verifier>>,
    pub clock: Arc<dyn Clock>,
}

/// The generators in the order they are consulted; the first match wins.
pub fn credential_generators(
    config: &Configuration,
    deps: &Dependencies,
) -> Result<Vec<Box<dyn CredentialGenerator>>, configuration::Error> {
    let mut generators: Vec<Box<dyn CredentialGenerator>> = vec![
        Box::new(internal_secret::InternalSecret::new(&config.internal_secrets)),
        Box::new(oidc_cli::OidcCliSecret::new(deps.stores.users.clone())),
        Box::new(v2_token::RegistryBearer::new(deps.signer.clone())),
    ];

    if let Some(verifier) = &deps.oidc {
        generators.push(Box::new(id_token::IdToken::new(
            verifier.clone(),
            deps.stores.users.clone(),
            deps.stores.groups.clone(),
        )));
    }

    if let Some(proxy_config) = &config.http_auth_proxy {
        generators.push(Box::new(auth_proxy::AuthProxy::new(
            proxy_config,
            deps.stores.users.clone(),
            deps.stores.groups.clone(),
        )?));
    }

    generators.push(Box::new(robot::RobotCredential::new(
        &config.robot_name_prefix,
        deps.stores.robots.clone(),
        deps.signer.clone(),
        deps.clock.clone(),
    )));
    generators.push(Box::new(basic_auth::BasicCredential::new(
        deps.authenticator.clone(),
    )));
    generators.push(Box::new(session::SessionCookie::new(deps.sessions.clone())));
    generators.push(Box::new(proxy_cache_secret::ProxyCacheSecret::new(
        deps.proxy_cache_secrets.clone(),
    )));

    Ok(generators)
}
