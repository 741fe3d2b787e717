use std::sync::Arc;

use hyper::http::request::Parts;
use tracing::{debug, instrument, Span};

use crate::command::server::auth::{AuthRequest, CredentialGenerator};
use crate::configuration::AuthMode;
use crate::metrics_provider::AUTH_ATTEMPTS;
use crate::security::{Principal, Rbac, SecurityContext};

/// Walks the credential generators in order and installs the first principal found.
pub struct SecurityMiddleware {
    auth_mode: AuthMode,
    generators: Vec<Box<dyn CredentialGenerator>>,
    rbac: Arc<Rbac>,
}

impl SecurityMiddleware {
    pub fn new(
        auth_mode: AuthMode,
        generators: Vec<Box<dyn CredentialGenerator>>,
        rbac: Arc<Rbac>,
    ) -> Self {
        Self {
            auth_mode,
            generators,
            rbac,
        }
    }

    #[instrument(skip(self, parts), fields(auth_method = tracing::field::Empty))]
    pub async fn authenticate(&self, parts: &Parts) -> Option<SecurityContext> {
        let request = AuthRequest {
            parts,
            auth_mode: self.auth_mode,
        };

        for generator in &self.generators {
            if let Some(principal) = generator.generate(&request).await {
                debug!(
                    "Authenticated '{}' with {}",
                    principal.username(),
                    generator.name()
                );
                AUTH_ATTEMPTS
                    .with_label_values(&[generator.name(), "success"])
                    .inc();
                Span::current().record("auth_method", generator.name());
                return Some(self.context_for(principal));
            }
        }

        Span::current().record("auth_method", "anonymous");
        None
    }

    pub fn context_for(&self, principal: Principal) -> SecurityContext {
        SecurityContext::new(principal, self.rbac.clone())
    }

    /// Context installed when no generator recognized the request.
    pub fn unauthorized(&self) -> SecurityContext {
        self.context_for(Principal::Anonymous)
    }

    /// Always yields a context, falling back to the anonymous one.
    pub async fn security_context(&self, parts: &Parts) -> SecurityContext {
        match self.authenticate(parts).await {
            Some(context) => context,
            None => self.unauthorized(),
        }
    }

    #[cfg(test)]
    pub fn generator_names(&self) -> Vec<&'static str> {
        self.generators.iter().map(|g| g.name()).collect()
    }
}
