use std::sync::Arc;

use async_trait::async_trait;

use crate::security::action::Action;
use crate::security::evaluator::Evaluator;
use crate::security::principal::Principal;
use crate::security::resource::{Namespace, Resource, ResourceKind};
use crate::store::{Error, ProjectStore};

/// The proxy-cache worker may pull and push the repository it is bound to.
pub struct ProxyCacheEvaluator {
    projects: Arc<dyn ProjectStore>,
}

impl ProxyCacheEvaluator {
    pub fn new(projects: Arc<dyn ProjectStore>) -> Self {
        Self { projects }
    }
}

#[async_trait]
impl Evaluator for ProxyCacheEvaluator {
    fn name(&self) -> &'static str {
        "proxy-cache"
    }

    async fn has_permission(
        &self,
        principal: &Principal,
        resource: &Resource,
        action: Action,
    ) -> Result<bool, Error> {
        let Principal::ProxyCache { repository } = principal else {
            return Ok(false);
        };
        let Namespace::Project(project_id) = resource.namespace else {
            return Ok(false);
        };
        if resource.kind != ResourceKind::Repository
            || !matches!(action, Action::Pull | Action::Push)
        {
            return Ok(false);
        }

        let Some((project_name, _)) = repository.split_once('/') else {
            return Ok(false);
        };
        let project = self.projects.get_project_by_id(project_id).await?;

        Ok(project.is_some_and(|project| project.name == project_name))
    }
}
