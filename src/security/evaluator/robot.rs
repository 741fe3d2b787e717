use async_trait::async_trait;

use crate::security::action::Action;
use crate::security::evaluator::Evaluator;
use crate::security::policy;
use crate::security::principal::Principal;
use crate::security::resource::Resource;
use crate::store::Error;

/// Robots never go through role lookup: their embedded policies are the
/// whole truth.
pub struct RobotPolicyEvaluator;

#[async_trait]
impl Evaluator for RobotPolicyEvaluator {
    fn name(&self) -> &'static str {
        "robot-policy"
    }

    async fn has_permission(
        &self,
        principal: &Principal,
        resource: &Resource,
        action: Action,
    ) -> Result<bool, Error> {
        let Principal::Robot(robot) = principal else {
            return Ok(false);
        };

        Ok(policy::evaluate(&robot.policies, resource, action))
    }
}
