use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

mod project_role;
mod proxy_cache;
mod public_project;
mod robot;
mod solution;
mod system_admin;
mod token_access;

pub use project_role::ProjectRoleEvaluator;
pub use proxy_cache::ProxyCacheEvaluator;
pub use public_project::PublicProjectEvaluator;
pub use robot::RobotPolicyEvaluator;
pub use solution::SolutionUserEvaluator;
pub use system_admin::SystemAdminEvaluator;
pub use token_access::TokenAccessEvaluator;

use crate::security::action::Action;
use crate::security::principal::Principal;
use crate::security::resource::Resource;
use crate::store::{Error, Stores};

/// One permission rule. Returning `false` means "no opinion": the chain
/// moves on to the next evaluator.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn has_permission(
        &self,
        principal: &Principal,
        resource: &Resource,
        action: Action,
    ) -> Result<bool, Error>;
}

/// Ordered evaluators; the first allow wins, deny is the default.
pub struct EvaluatorChain {
    evaluators: Vec<Box<dyn Evaluator>>,
}

impl EvaluatorChain {
    pub fn new(evaluators: Vec<Box<dyn Evaluator>>) -> Self {
        Self { evaluators }
    }

    pub fn with_stores(stores: &Stores) -> Self {
        Self::new(vec![
            Box::new(SystemAdminEvaluator),
            Box::new(PublicProjectEvaluator::new(stores.projects.clone())),
            Box::new(SolutionUserEvaluator),
            Box::new(RobotPolicyEvaluator),
            Box::new(TokenAccessEvaluator::new(stores.projects.clone())),
            Box::new(ProxyCacheEvaluator::new(stores.projects.clone())),
            Box::new(ProjectRoleEvaluator::new(stores.members.clone())),
        ])
    }

    pub async fn has_permission(
        &self,
        principal: &Principal,
        resource: &Resource,
        action: Action,
    ) -> Result<bool, Error> {
        for evaluator in &self.evaluators {
            if evaluator.has_permission(principal, resource, action).await? {
                debug!(
                    "'{}' allowed {action} on {resource} for '{}'",
                    evaluator.name(),
                    principal.username()
                );
                return Ok(true);
            }
        }

        Ok(false)
    }
}

/// Shared handle on the chain and the lookups the security context needs.
pub struct Rbac {
    pub chain: EvaluatorChain,
    pub stores: Stores,
}

impl Rbac {
    pub fn new(stores: Stores) -> Arc<Self> {
        Arc::new(Self {
            chain: EvaluatorChain::with_stores(&stores),
            stores,
        })
    }
}

#[cfg(test)]
pub mod tests;
