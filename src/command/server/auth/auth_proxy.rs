//! Delegates `docker login` credentials to an external token-review service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::command::server::auth::{rejected, AuthRequest, CredentialGenerator};
use crate::command::server::request_ext::HeaderExt;
use crate::configuration::{self, AuthMode};
use crate::security::Principal;
use crate::store::{self, GroupStore, GroupType, User, UserStore};

const REVIEW_API_VERSION: &str = "authentication.k8s.io/v1beta1";
const REVIEW_KIND: &str = "TokenReview";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Login endpoint of the proxy.
    pub endpoint: String,
    pub token_review_endpoint: String,
    #[serde(default = "Config::default_verify_cert")]
    pub verify_cert: bool,
    /// Users and groups are not searched on the proxy side.
    #[serde(default)]
    pub skip_search: bool,
    #[serde(default = "Config::default_case_sensitive")]
    pub case_sensitive: bool,
    #[serde(default)]
    pub admin_groups: Vec<String>,
    #[serde(default)]
    pub admin_usernames: Vec<String>,
    #[serde(default = "Config::default_username_prefix")]
    pub username_prefix: String,
    /// Seconds allowed for one review call.
    #[serde(default = "Config::default_timeout")]
    pub timeout: u64,
}

impl Config {
    fn default_verify_cert() -> bool {
        true
    }

    fn default_case_sensitive() -> bool {
        true
    }

    fn default_username_prefix() -> String {
        "tokenreview$".to_string()
    }

    fn default_timeout() -> u64 {
        15
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenReview<'a> {
    api_version: &'static str,
    kind: &'static str,
    spec: ReviewSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ReviewSpec<'a> {
    token: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewResponse {
    #[serde(default)]
    status: ReviewStatus,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewStatus {
    #[serde(default)]
    authenticated: bool,
    #[serde(default)]
    user: ReviewedUser,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewedUser {
    #[serde(default)]
    username: String,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    extra: HashMap<String, Value>,
}

pub struct AuthProxy {
    config: Config,
    client: Client,
    users: Arc<dyn UserStore>,
    groups: Arc<dyn GroupStore>,
}

impl AuthProxy {
    pub fn new(
        config: &Config,
        users: Arc<dyn UserStore>,
        groups: Arc<dyn GroupStore>,
    ) -> Result<Self, configuration::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .danger_accept_invalid_certs(!config.verify_cert)
            .build()?;

        Ok(Self {
            config: config.clone(),
            client,
            users,
            groups,
        })
    }

    #[instrument(skip(self, token))]
    async fn review(&self, token: &str) -> Result<ReviewStatus, String> {
        let review = TokenReview {
            api_version: REVIEW_API_VERSION,
            kind: REVIEW_KIND,
            spec: ReviewSpec { token },
        };

        let response = self
            .client
            .post(&self.config.token_review_endpoint)
            .json(&review)
            .send()
            .await
            .map_err(|e| format!("token review failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("token review failed: HTTP {}", response.status()));
        }

        let response: ReviewResponse = response
            .json()
            .await
            .map_err(|e| format!("unexpected token review response: {e}"))?;
        Ok(response.status)
    }

    fn same_name(&self, a: &str, b: &str) -> bool {
        if self.config.case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }

    /// Local record of the reviewed user, created on first sight.
    async fn onboard(&self, username: &str) -> Result<User, store::Error> {
        let user = User {
            username: username.to_string(),
            realname: username.to_string(),
            ..User::default()
        };

        match self.users.onboard_user(user).await {
            Ok(user) => Ok(user),
            Err(store::Error::Duplicate(_)) => self
                .users
                .get_user_by_name(username)
                .await?
                .ok_or_else(|| store::Error::NotFound(username.to_string())),
            Err(error) => Err(error),
        }
    }

    fn is_admin(&self, username: &str, groups: &[String]) -> bool {
        self.config
            .admin_usernames
            .iter()
            .any(|admin| self.same_name(admin, username))
            || groups
                .iter()
                .any(|group| self.config.admin_groups.contains(group))
    }
}

#[async_trait]
impl CredentialGenerator for AuthProxy {
    fn name(&self) -> &'static str {
        "auth_proxy"
    }

    async fn generate(&self, request: &AuthRequest<'_>) -> Option<Principal> {
        if request.auth_mode != AuthMode::HttpAuth
            || !(request.is_registry_path() || request.is_token_path())
        {
            return None;
        }

        let (login, token) = request.parts.basic_auth()?;
        let username = login.strip_prefix(&self.config.username_prefix)?;

        let status = match self.review(&token).await {
            Ok(status) => status,
            Err(error) => return rejected(self.name(), error),
        };
        if !status.authenticated {
            let reason = status.error.unwrap_or_else(|| "not authenticated".to_string());
            return rejected(self.name(), format!("review of '{username}': {reason}"));
        }
        if !self.same_name(username, &status.user.username) {
            return rejected(
                self.name(),
                format!(
                    "token belongs to '{}', not '{username}'",
                    status.user.username
                ),
            );
        }

        let mut user = match self.onboard(&status.user.username).await {
            Ok(user) => user,
            Err(error) => return rejected(self.name(), error),
        };

        if !status.user.groups.is_empty() {
            match self
                .groups
                .get_group_ids(&status.user.groups, GroupType::Http)
                .await
            {
                Ok(ids) => user.group_ids = ids,
                Err(error) => warn!("Ignoring groups of '{}': {error}", user.username),
            }
        }
        user.admin_role_in_auth = self.is_admin(&user.username, &status.user.groups);

        debug!(
            "Token review accepted '{}' with extra {:?}",
            user.username, status.user.extra
        );
        Some(Principal::User(user))
    }
}
