use std::sync::Arc;

use async_trait::async_trait;

use crate::security::action::Action;
use crate::security::evaluator::Evaluator;
use crate::security::principal::Principal;
use crate::security::resource::{Namespace, Resource};
use crate::store::{Error, MemberStore};

/// Union of the roles a user holds in the project, directly or through
/// its groups.
pub struct ProjectRoleEvaluator {
    members: Arc<dyn MemberStore>,
}

impl ProjectRoleEvaluator {
    pub fn new(members: Arc<dyn MemberStore>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl Evaluator for ProjectRoleEvaluator {
    fn name(&self) -> &'static str {
        "project-role"
    }

    async fn has_permission(
        &self,
        principal: &Principal,
        resource: &Resource,
        action: Action,
    ) -> Result<bool, Error> {
        let (Principal::User(user), Namespace::Project(project_id)) =
            (principal, resource.namespace)
        else {
            return Ok(false);
        };

        let roles = self
            .members
            .get_roles(project_id, user.user_id, &user.group_ids)
            .await?;

        Ok(roles.iter().any(|role| role.allows(resource.kind, action)))
    }
}
