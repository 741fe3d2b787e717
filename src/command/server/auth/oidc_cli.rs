use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use async_trait::async_trait;
use tracing::debug;

use crate::command::server::auth::{rejected, AuthRequest, CredentialGenerator};
use crate::command::server::request_ext::HeaderExt;
use crate::configuration::AuthMode;
use crate::security::Principal;
use crate::store::UserStore;

/// Basic credentials whose password is the CLI secret of an OIDC-onboarded user.
pub struct OidcCliSecret {
    users: Arc<dyn UserStore>,
}

impl OidcCliSecret {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    fn applies(request: &AuthRequest<'_>) -> bool {
        let path = request.path();
        request.auth_mode == AuthMode::OidcAuth
            && (request.is_token_path()
                || request.is_registry_path()
                || path.starts_with("/chartrepo/")
                || path.starts_with("/api/chartrepo/"))
    }
}

#[async_trait]
impl CredentialGenerator for OidcCliSecret {
    fn name(&self) -> &'static str {
        "oidc_cli"
    }

    async fn generate(&self, request: &AuthRequest<'_>) -> Option<Principal> {
        if !Self::applies(request) {
            return None;
        }
        let (username, secret) = request.parts.basic_auth()?;

        let user = match self.users.get_user_by_name(&username).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("No user named '{username}' for an OIDC CLI secret");
                return None;
            }
            Err(error) => return rejected(self.name(), error),
        };

        let oidc_user = match self.users.get_oidc_user(user.user_id).await {
            Ok(Some(oidc_user)) => oidc_user,
            Ok(None) => {
                debug!("User '{username}' was not onboarded through OIDC");
                return None;
            }
            Err(error) => return rejected(self.name(), error),
        };

        let Ok(hash) = PasswordHash::new(&oidc_user.secret) else {
            return rejected(self.name(), "stored CLI secret is not a valid hash");
        };
        if Argon2::default()
            .verify_password(secret.as_bytes(), &hash)
            .is_err()
        {
            return rejected(self.name(), format!("CLI secret mismatch for '{username}'"));
        }

        Some(Principal::User(user))
    }
}
