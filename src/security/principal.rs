use serde::{Deserialize, Serialize};

use crate::security::policy::Policy;
use crate::store::User;
use crate::token::ResourceActions;

pub const PROXY_CACHE_SERVICE: &str = "harbor#proxy-cache-service";

/// An authenticated robot account with its effective policies.
#[derive(Clone, Debug, PartialEq)]
pub struct RobotAccount {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
    pub policies: Vec<Policy>,
}

/// Who is behind a request, as settled by the credential generators.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Principal {
    #[default]
    Anonymous,
    User(User),
    Robot(RobotAccount),
    /// Bearer of a registry token minted by the token endpoint.
    Token {
        subject: String,
        access: Vec<ResourceActions>,
    },
    /// The proxy-cache worker, bound to a single repository.
    ProxyCache { repository: String },
    /// An internal component presenting a shared secret.
    Solution { name: String },
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Anonymous,
    Local,
    Robot,
    Token,
    ProxyCache,
    Secret,
}

impl Principal {
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::Anonymous => PrincipalKind::Anonymous,
            Principal::User(_) => PrincipalKind::Local,
            Principal::Robot(_) => PrincipalKind::Robot,
            Principal::Token { .. } => PrincipalKind::Token,
            Principal::ProxyCache { .. } => PrincipalKind::ProxyCache,
            Principal::Solution { .. } => PrincipalKind::Secret,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Principal::Anonymous => "",
            Principal::User(user) => &user.username,
            Principal::Robot(robot) => &robot.name,
            Principal::Token { subject, .. } => subject,
            Principal::ProxyCache { .. } => PROXY_CACHE_SERVICE,
            Principal::Solution { name } => name,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Principal::Anonymous)
    }

    pub fn is_sysadmin(&self) -> bool {
        match self {
            Principal::User(user) => user.sysadmin_flag || user.admin_role_in_auth,
            _ => false,
        }
    }

    pub fn is_solution_user(&self) -> bool {
        matches!(self, Principal::Solution { .. })
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::User(user) => Some(user),
            _ => None,
        }
    }
}
