use std::collections::HashMap;

use async_trait::async_trait;

use crate::command::server::auth::{rejected, AuthRequest, CredentialGenerator};
use crate::command::server::request_ext::HeaderExt;
use crate::secret::Secret;
use crate::security::Principal;

const SCHEME: &str = "Harbor-Secret";

/// `Authorization: Harbor-Secret <secret>` presented by internal components.
pub struct InternalSecret {
    secrets: Vec<(String, Secret<String>)>,
}

impl InternalSecret {
    pub fn new(secrets: &HashMap<String, Secret<String>>) -> Self {
        let secrets = secrets
            .iter()
            .map(|(name, secret)| (name.clone(), secret.clone()))
            .collect();
        Self { secrets }
    }
}

#[async_trait]
impl CredentialGenerator for InternalSecret {
    fn name(&self) -> &'static str {
        "secret"
    }

    async fn generate(&self, request: &AuthRequest<'_>) -> Option<Principal> {
        let presented = request.parts.authorization(SCHEME)?;

        match self
            .secrets
            .iter()
            .find(|(_, secret)| !secret.is_empty() && secret.matches(&presented))
        {
            Some((name, _)) => Some(Principal::Solution { name: name.clone() }),
            None => rejected(self.name(), "unknown internal secret"),
        }
    }
}
