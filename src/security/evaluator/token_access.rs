use std::sync::Arc;

use async_trait::async_trait;

use crate::security::action::Action;
use crate::security::evaluator::Evaluator;
use crate::security::principal::Principal;
use crate::security::resource::{Namespace, Resource, ResourceKind};
use crate::store::{Error, ProjectStore};

/// Registry tokens carry their grants: a repository entry counts for the
/// project its name lives in.
pub struct TokenAccessEvaluator {
    projects: Arc<dyn ProjectStore>,
}

impl TokenAccessEvaluator {
    pub fn new(projects: Arc<dyn ProjectStore>) -> Self {
        Self { projects }
    }
}

#[async_trait]
impl Evaluator for TokenAccessEvaluator {
    fn name(&self) -> &'static str {
        "token-access"
    }

    async fn has_permission(
        &self,
        principal: &Principal,
        resource: &Resource,
        action: Action,
    ) -> Result<bool, Error> {
        let Principal::Token { access, .. } = principal else {
            return Ok(false);
        };
        let Namespace::Project(project_id) = resource.namespace else {
            return Ok(false);
        };
        if resource.kind != ResourceKind::Repository {
            return Ok(false);
        }

        let Some(project) = self.projects.get_project_by_id(project_id).await? else {
            return Ok(false);
        };

        // Resources stop at the project: a grant on one repository answers for the
        // whole project here. The registry checks repository names against the token.
        Ok(access.iter().any(|entry| {
            entry.kind == "repository"
                && entry
                    .name
                    .split_once('/')
                    .is_some_and(|(namespace, _)| namespace == project.name)
                && entry
                    .actions
                    .iter()
                    .any(|granted| granted == "*" || granted == action.as_str())
        }))
    }
}
