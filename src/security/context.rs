use std::sync::Arc;

use crate::security::action::Action;
use crate::security::evaluator::Rbac;
use crate::security::principal::Principal;
use crate::security::resource::{Namespace, Resource};
use crate::security::role::Role;
use crate::store::{Error, Project};

/// The principal of a request together with the means to check what it may do.
#[derive(Clone)]
pub struct SecurityContext {
    principal: Arc<Principal>,
    rbac: Arc<Rbac>,
}

impl SecurityContext {
    pub fn new(principal: Principal, rbac: Arc<Rbac>) -> Self {
        Self {
            principal: Arc::new(principal),
            rbac,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn username(&self) -> &str {
        self.principal.username()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_authenticated()
    }

    pub fn is_sysadmin(&self) -> bool {
        self.principal.is_sysadmin()
    }

    pub fn is_solution_user(&self) -> bool {
        self.principal.is_solution_user()
    }

    pub async fn can(&self, resource: &Resource, action: Action) -> Result<bool, Error> {
        self.rbac
            .chain
            .has_permission(&self.principal, resource, action)
            .await
    }

    /// Projects the principal is a member of, or is explicitly granted access to.
    pub async fn get_my_projects(&self) -> Result<Vec<Project>, Error> {
        let stores = &self.rbac.stores;

        let project_ids = match self.principal.as_ref() {
            Principal::User(user) => {
                stores
                    .members
                    .get_project_ids(user.user_id, &user.group_ids)
                    .await?
            }
            Principal::Robot(robot) => {
                let mut ids = Vec::new();
                for policy in &robot.policies {
                    let namespace = policy
                        .resource
                        .match_indices('/')
                        .nth(2)
                        .map_or(policy.resource.as_str(), |(end, _)| &policy.resource[..end]);
                    if let Ok(Namespace::Project(id)) = namespace.parse::<Namespace>() {
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                }
                ids
            }
            Principal::Token { access, .. } => {
                let mut projects: Vec<Project> = Vec::new();
                for entry in access.iter().filter(|entry| entry.kind == "repository") {
                    let Some((namespace, _)) = entry.name.split_once('/') else {
                        continue;
                    };
                    if projects.iter().any(|project| project.name == namespace) {
                        continue;
                    }
                    if let Some(project) = stores.projects.get_project_by_name(namespace).await? {
                        projects.push(project);
                    }
                }
                return Ok(projects);
            }
            Principal::ProxyCache { repository } => {
                let Some((namespace, _)) = repository.split_once('/') else {
                    return Ok(Vec::new());
                };
                let project = stores.projects.get_project_by_name(namespace).await?;
                return Ok(project.into_iter().collect());
            }
            Principal::Anonymous | Principal::Solution { .. } => Vec::new(),
        };

        let mut projects = Vec::with_capacity(project_ids.len());
        for project_id in project_ids {
            if let Some(project) = stores.projects.get_project_by_id(project_id).await? {
                projects.push(project);
            }
        }

        Ok(projects)
    }

    /// Roles held in the project; only local users hold roles.
    pub async fn get_project_roles(&self, project_id: i64) -> Result<Vec<Role>, Error> {
        match self.principal.as_ref() {
            Principal::User(user) => {
                self.rbac
                    .stores
                    .members
                    .get_roles(project_id, user.user_id, &user.group_ids)
                    .await
            }
            _ => Ok(Vec::new()),
        }
    }
}
