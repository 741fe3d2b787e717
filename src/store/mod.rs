use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod error;
pub mod memory;

pub use error::Error;
pub use memory::MemoryStore;

use crate::security::policy::RobotPermission;
use crate::security::role::Role;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub realname: String,
    #[serde(default)]
    pub sysadmin_flag: bool,
    // granted by the external identity provider, never persisted
    #[serde(default)]
    pub admin_role_in_auth: bool,
    #[serde(default)]
    pub group_ids: Vec<i64>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    Ldap,
    Http,
    Oidc,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UserGroup {
    pub id: i64,
    pub name: String,
    pub group_type: GroupType,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Project {
    pub project_id: i64,
    pub name: String,
    #[serde(default)]
    pub public: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotLevel {
    #[default]
    System,
    Project,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Robot {
    pub id: i64,
    pub name: String,
    pub secret: String,
    pub salt: String,
    #[serde(default)]
    pub disabled: bool,
    /// Unix seconds; `-1` never expires.
    #[serde(default = "Robot::never_expires")]
    pub expires_at: i64,
    #[serde(default)]
    pub level: RobotLevel,
    #[serde(default)]
    pub project_id: i64,
    #[serde(default)]
    pub permissions: Vec<RobotPermission>,
}

impl Robot {
    fn never_expires() -> i64 {
        -1
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at != -1 && now >= self.expires_at
    }

    /// Grants in force. A project robot keeps only those scoped to its own project.
    pub fn effective_permissions(&self) -> impl Iterator<Item = &RobotPermission> + '_ {
        self.permissions
            .iter()
            .filter(move |permission| match self.level {
                RobotLevel::System => true,
                RobotLevel::Project => self.owns_scope(&permission.scope),
            })
    }

    /// A project robot holds at most one grant, on its own project.
    pub fn validate(&self) -> Result<(), String> {
        if self.level == RobotLevel::System {
            return Ok(());
        }

        if self.permissions.len() > 1 {
            return Err(format!(
                "project robot '{}' may hold a single permission",
                self.name
            ));
        }

        match self
            .permissions
            .iter()
            .find(|permission| !self.owns_scope(&permission.scope))
        {
            Some(permission) => Err(format!(
                "project robot '{}' cannot be granted scope '{}'",
                self.name, permission.scope
            )),
            None => Ok(()),
        }
    }

    fn owns_scope(&self, scope: &str) -> bool {
        scope.trim_end_matches('/') == format!("/project/{}", self.project_id)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OidcUser {
    pub user_id: i64,
    pub subject: String,
    pub issuer: String,
    /// Argon2 PHC hash of the CLI secret.
    pub secret: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>, Error>;

    async fn get_user_by_name(&self, username: &str) -> Result<Option<User>, Error>;

    async fn get_password_hash(&self, username: &str) -> Result<Option<String>, Error>;

    async fn get_oidc_user(&self, user_id: i64) -> Result<Option<OidcUser>, Error>;

    async fn get_user_by_subject(&self, subject: &str, issuer: &str)
        -> Result<Option<User>, Error>;

    /// Inserts a user coming from an external identity provider.
    /// Fails with [`Error::Duplicate`] when the username is taken.
    async fn onboard_user(&self, user: User) -> Result<User, Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Ids of the known groups among `names`; unknown names are skipped.
    async fn get_group_ids(&self, names: &[String], group_type: GroupType)
        -> Result<Vec<i64>, Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project_by_id(&self, project_id: i64) -> Result<Option<Project>, Error>;

    async fn get_project_by_name(&self, name: &str) -> Result<Option<Project>, Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Roles held in a project by the user directly or through any of its groups.
    async fn get_roles(
        &self,
        project_id: i64,
        user_id: i64,
        group_ids: &[i64],
    ) -> Result<Vec<Role>, Error>;

    async fn get_project_ids(&self, user_id: i64, group_ids: &[i64]) -> Result<Vec<i64>, Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RobotStore: Send + Sync {
    async fn get_robot_by_id(&self, id: i64) -> Result<Option<Robot>, Error>;

    async fn get_robot_by_name(&self, name: &str) -> Result<Option<Robot>, Error>;
}

/// Handles on every store port, shared by the authenticators and the evaluators.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub groups: Arc<dyn GroupStore>,
    pub projects: Arc<dyn ProjectStore>,
    pub members: Arc<dyn MemberStore>,
    pub robots: Arc<dyn RobotStore>,
}

impl Stores {
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            groups: store.clone(),
            projects: store.clone(),
            members: store.clone(),
            robots: store,
        }
    }
}
