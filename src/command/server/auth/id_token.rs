use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::command::server::auth::oidc::Verifier;
use crate::command::server::auth::{rejected, AuthRequest, CredentialGenerator};
use crate::command::server::request_ext::HeaderExt;
use crate::configuration::AuthMode;
use crate::security::Principal;
use crate::store::{GroupStore, GroupType, UserStore};

/// OIDC ID tokens presented as bearer tokens to the API.
pub struct IdToken {
    verifier: Arc<Verifier>,
    users: Arc<dyn UserStore>,
    groups: Arc<dyn GroupStore>,
}

impl IdToken {
    pub fn new(
        verifier: Arc<Verifier>,
        users: Arc<dyn UserStore>,
        groups: Arc<dyn GroupStore>,
    ) -> Self {
        Self {
            verifier,
            users,
            groups,
        }
    }
}

#[async_trait]
impl CredentialGenerator for IdToken {
    fn name(&self) -> &'static str {
        "id_token"
    }

    async fn generate(&self, request: &AuthRequest<'_>) -> Option<Principal> {
        if request.auth_mode != AuthMode::OidcAuth || !request.is_api_path() {
            return None;
        }
        let token = request.parts.bearer_token()?;

        let claims = match self.verifier.verify(&token).await {
            Ok(claims) => claims,
            Err(error) => return rejected(self.name(), error),
        };

        let mut user = match self
            .users
            .get_user_by_subject(&claims.subject, &claims.issuer)
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => {
                return rejected(
                    self.name(),
                    format!("subject '{}' is not onboarded", claims.subject),
                )
            }
            Err(error) => return rejected(self.name(), error),
        };

        if !claims.groups.is_empty() {
            match self
                .groups
                .get_group_ids(&claims.groups, GroupType::Oidc)
                .await
            {
                Ok(ids) => user.group_ids = ids,
                Err(error) => warn!("Ignoring groups of '{}': {error}", user.username),
            }
        }

        Some(Principal::User(user))
    }
}
