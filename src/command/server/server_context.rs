use std::sync::Arc;

use tracing::{info, instrument};

use crate::cache::Cache;
use crate::clock::Clock;
use crate::command::server::auth::oidc::Verifier;
use crate::command::server::auth::{
    credential_generators, Authenticator, Dependencies, LocalAuthenticator, SecurityMiddleware,
};
use crate::command::server::error::Error;
use crate::command::server::token_service::TokenService;
use crate::configuration::Configuration;
use crate::proxy_cache::SecretManager;
use crate::security::Rbac;
use crate::session::Sessions;
use crate::store::{MemoryStore, Stores};
use crate::token::TokenSigner;

/// State that outlives a configuration reload.
#[derive(Clone)]
pub struct SharedState {
    pub cache: Arc<dyn Cache>,
    pub proxy_cache_secrets: Arc<SecretManager>,
    pub clock: Arc<dyn Clock>,
}

pub struct ServerContext {
    pub middleware: SecurityMiddleware,
    pub token_service: TokenService,
    pub sessions: Arc<Sessions>,
    pub authenticator: Arc<dyn Authenticator>,
    pub proxy_cache_secrets: Arc<SecretManager>,
    pub ext_endpoint: Option<String>,
}

impl ServerContext {
    #[instrument(skip_all)]
    pub fn new(config: &Configuration, shared: &SharedState) -> Result<Self, Error> {
        let stores = Stores::from_memory(Arc::new(MemoryStore::new(&config.store)));
        let signer = Arc::new(
            TokenSigner::new(&config.token, shared.clock.clone()).map_err(|error| {
                Error::Initialization(format!("Failed to load token signing key: {error}"))
            })?,
        );

        let oidc = match &config.oidc {
            Some(oidc_config) => {
                info!("OIDC provider: {}", oidc_config.issuer());
                Some(Arc::new(Verifier::new(oidc_config, shared.cache.clone())?))
            }
            None => None,
        };

        let deps = Dependencies {
            authenticator: Arc::new(LocalAuthenticator::new(stores.users.clone())),
            signer: signer.clone(),
            sessions: Arc::new(Sessions::new(&config.session, shared.cache.clone())),
            proxy_cache_secrets: shared.proxy_cache_secrets.clone(),
            oidc,
            clock: shared.clock.clone(),
            stores: stores.clone(),
        };

        let middleware = SecurityMiddleware::new(
            config.auth_mode,
            credential_generators(config, &deps)?,
            Rbac::new(stores.clone()),
        );
        let token_service = TokenService::new(config.ext_endpoint(), signer, stores.projects);

        Ok(Self {
            middleware,
            token_service,
            sessions: deps.sessions,
            authenticator: deps.authenticator,
            proxy_cache_secrets: deps.proxy_cache_secrets,
            ext_endpoint: config.ext_endpoint().map(ToString::to_string),
        })
    }
}
