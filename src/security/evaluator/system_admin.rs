use async_trait::async_trait;

use crate::security::action::Action;
use crate::security::evaluator::Evaluator;
use crate::security::principal::Principal;
use crate::security::resource::Resource;
use crate::store::Error;

pub struct SystemAdminEvaluator;

#[async_trait]
impl Evaluator for SystemAdminEvaluator {
    fn name(&self) -> &'static str {
        "system-admin"
    }

    async fn has_permission(
        &self,
        principal: &Principal,
        _resource: &Resource,
        _action: Action,
    ) -> Result<bool, Error> {
        Ok(principal.is_sysadmin())
    }
}
