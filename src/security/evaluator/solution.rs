use async_trait::async_trait;

use crate::security::action::Action;
use crate::security::evaluator::Evaluator;
use crate::security::principal::Principal;
use crate::security::resource::{Namespace, Resource, ResourceKind};
use crate::store::Error;

/// Internal components holding the shared secret may read any repository.
pub struct SolutionUserEvaluator;

#[async_trait]
impl Evaluator for SolutionUserEvaluator {
    fn name(&self) -> &'static str {
        "solution-user"
    }

    async fn has_permission(
        &self,
        principal: &Principal,
        resource: &Resource,
        action: Action,
    ) -> Result<bool, Error> {
        if !principal.is_solution_user() {
            return Ok(false);
        }

        Ok(matches!(resource.namespace, Namespace::Project(_))
            && resource.kind == ResourceKind::Repository
            && matches!(action, Action::Pull | Action::Read | Action::List))
    }
}
