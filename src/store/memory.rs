use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::security::role::Role;
use crate::store::{
    Error, GroupStore, GroupType, MemberStore, OidcUser, Project, ProjectStore, Robot, RobotStore,
    User, UserGroup, UserStore,
};

#[derive(Clone, Debug, Deserialize)]
pub struct UserConfig {
    #[serde(flatten)]
    pub user: User,
    /// Argon2 PHC hash, absent for users that only log in through an external provider.
    pub password: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MemberConfig {
    pub project_id: i64,
    pub user_id: Option<i64>,
    pub group_id: Option<i64>,
    pub role: Role,
}

/// Seed data of the in-memory store.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub users: Vec<UserConfig>,
    #[serde(default)]
    pub groups: Vec<UserGroup>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub members: Vec<MemberConfig>,
    #[serde(default)]
    pub robots: Vec<Robot>,
    #[serde(default)]
    pub oidc_users: Vec<OidcUser>,
}

#[derive(Default)]
struct State {
    users: HashMap<i64, User>,
    passwords: HashMap<String, String>,
    oidc_users: HashMap<i64, OidcUser>,
    groups: Vec<UserGroup>,
    projects: HashMap<i64, Project>,
    members: Vec<MemberConfig>,
    robots: HashMap<i64, Robot>,
}

pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new(config: &Config) -> Self {
        let mut state = State::default();

        for entry in &config.users {
            if let Some(password) = &entry.password {
                state
                    .passwords
                    .insert(entry.user.username.clone(), password.clone());
            }
            state.users.insert(entry.user.user_id, entry.user.clone());
        }
        for oidc_user in &config.oidc_users {
            state.oidc_users.insert(oidc_user.user_id, oidc_user.clone());
        }
        for project in &config.projects {
            state.projects.insert(project.project_id, project.clone());
        }
        for robot in &config.robots {
            state.robots.insert(robot.id, robot.clone());
        }
        state.groups.clone_from(&config.groups);
        state.members.clone_from(&config.members);

        info!(
            "Memory store seeded with {} users, {} projects, {} robots",
            state.users.len(),
            state.projects.len(),
            state.robots.len()
        );

        Self {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>, Error> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn get_user_by_name(&self, username: &str) -> Result<Option<User>, Error> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn get_password_hash(&self, username: &str) -> Result<Option<String>, Error> {
        Ok(self.state.read().await.passwords.get(username).cloned())
    }

    async fn get_oidc_user(&self, user_id: i64) -> Result<Option<OidcUser>, Error> {
        Ok(self.state.read().await.oidc_users.get(&user_id).cloned())
    }

    async fn get_user_by_subject(
        &self,
        subject: &str,
        issuer: &str,
    ) -> Result<Option<User>, Error> {
        let state = self.state.read().await;
        let user = state
            .oidc_users
            .values()
            .find(|oidc_user| oidc_user.subject == subject && oidc_user.issuer == issuer)
            .and_then(|oidc_user| state.users.get(&oidc_user.user_id))
            .cloned();

        Ok(user)
    }

    async fn onboard_user(&self, mut user: User) -> Result<User, Error> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(Error::Duplicate(format!("user '{}'", user.username)));
        }

        user.user_id = state.users.keys().max().copied().unwrap_or(0) + 1;
        user.admin_role_in_auth = false;
        user.group_ids.clear();
        state.users.insert(user.user_id, user.clone());

        Ok(user)
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn get_group_ids(
        &self,
        names: &[String],
        group_type: GroupType,
    ) -> Result<Vec<i64>, Error> {
        let state = self.state.read().await;
        Ok(state
            .groups
            .iter()
            .filter(|group| group.group_type == group_type && names.contains(&group.name))
            .map(|group| group.id)
            .collect())
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn get_project_by_id(&self, project_id: i64) -> Result<Option<Project>, Error> {
        Ok(self.state.read().await.projects.get(&project_id).cloned())
    }

    async fn get_project_by_name(&self, name: &str) -> Result<Option<Project>, Error> {
        let state = self.state.read().await;
        Ok(state
            .projects
            .values()
            .find(|project| project.name == name)
            .cloned())
    }
}

#[async_trait]
impl MemberStore for MemoryStore {
    async fn get_roles(
        &self,
        project_id: i64,
        user_id: i64,
        group_ids: &[i64],
    ) -> Result<Vec<Role>, Error> {
        let state = self.state.read().await;

        let mut roles = Vec::new();
        for member in state.members.iter().filter(|m| m.project_id == project_id) {
            let is_user = member.user_id == Some(user_id);
            let is_group = member.group_id.is_some_and(|id| group_ids.contains(&id));
            if (is_user || is_group) && !roles.contains(&member.role) {
                roles.push(member.role);
            }
        }

        Ok(roles)
    }

    async fn get_project_ids(&self, user_id: i64, group_ids: &[i64]) -> Result<Vec<i64>, Error> {
        let state = self.state.read().await;

        let mut project_ids = Vec::new();
        for member in &state.members {
            let is_user = member.user_id == Some(user_id);
            let is_group = member.group_id.is_some_and(|id| group_ids.contains(&id));
            if (is_user || is_group) && !project_ids.contains(&member.project_id) {
                project_ids.push(member.project_id);
            }
        }

        Ok(project_ids)
    }
}

#[async_trait]
impl RobotStore for MemoryStore {
    async fn get_robot_by_id(&self, id: i64) -> Result<Option<Robot>, Error> {
        Ok(self.state.read().await.robots.get(&id).cloned())
    }

    async fn get_robot_by_name(&self, name: &str) -> Result<Option<Robot>, Error> {
        let state = self.state.read().await;
        Ok(state.robots.values().find(|robot| robot.name == name).cloned())
    }
}
