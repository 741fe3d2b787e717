use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use async_trait::async_trait;
use tracing::{debug, error, instrument};

use crate::command::server::auth::{rejected, AuthRequest, CredentialGenerator};
use crate::command::server::request_ext::HeaderExt;
use crate::security::Principal;
use crate::store::{self, User, UserStore};

/// Checks a username and password against the configured user backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` when the credentials do not match.
    async fn authenticate(&self, username: &str, password: &str)
        -> Result<Option<User>, store::Error>;
}

/// Local user table with argon2id password hashes.
pub struct LocalAuthenticator {
    users: Arc<dyn UserStore>,
}

impl LocalAuthenticator {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Authenticator for LocalAuthenticator {
    #[instrument(skip(self, password))]
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, store::Error> {
        let Some(stored) = self.users.get_password_hash(username).await? else {
            debug!("No password set for '{username}'");
            return Ok(None);
        };

        let stored = match PasswordHash::new(&stored) {
            Ok(stored) => stored,
            Err(error) => {
                error!("Unable to parse password hash of '{username}': {error}");
                return Ok(None);
            }
        };

        if Argon2::default()
            .verify_password(password.as_bytes(), &stored)
            .is_err()
        {
            return Ok(None);
        }

        self.users.get_user_by_name(username).await
    }
}

pub struct BasicCredential {
    authenticator: Arc<dyn Authenticator>,
}

impl BasicCredential {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl CredentialGenerator for BasicCredential {
    fn name(&self) -> &'static str {
        "basic"
    }

    async fn generate(&self, request: &AuthRequest<'_>) -> Option<Principal> {
        let (username, password) = request.parts.basic_auth()?;

        match self.authenticator.authenticate(&username, &password).await {
            Ok(Some(user)) => Some(Principal::User(user)),
            Ok(None) => rejected(self.name(), format!("invalid credentials for '{username}'")),
            Err(error) => rejected(self.name(), error),
        }
    }
}
