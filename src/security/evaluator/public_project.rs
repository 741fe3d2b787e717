use std::sync::Arc;

use async_trait::async_trait;

use crate::security::action::Action;
use crate::security::evaluator::Evaluator;
use crate::security::principal::Principal;
use crate::security::resource::{Namespace, Resource, ResourceKind};
use crate::store::{Error, ProjectStore};

/// Anyone, authenticated or not, may pull from a public project.
pub struct PublicProjectEvaluator {
    projects: Arc<dyn ProjectStore>,
}

impl PublicProjectEvaluator {
    pub fn new(projects: Arc<dyn ProjectStore>) -> Self {
        Self { projects }
    }
}

#[async_trait]
impl Evaluator for PublicProjectEvaluator {
    fn name(&self) -> &'static str {
        "public-project"
    }

    async fn has_permission(
        &self,
        _principal: &Principal,
        resource: &Resource,
        action: Action,
    ) -> Result<bool, Error> {
        let Namespace::Project(project_id) = resource.namespace else {
            return Ok(false);
        };
        if resource.kind != ResourceKind::Repository || action != Action::Pull {
            return Ok(false);
        }

        let project = self.projects.get_project_by_id(project_id).await?;
        Ok(project.is_some_and(|project| project.public))
    }
}
