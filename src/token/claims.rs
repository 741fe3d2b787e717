use serde::{Deserialize, Serialize};

use crate::security::policy::Policy;
use crate::token::ResourceActions;

/// Claims whose time window the signer checks against its own clock.
pub trait TimeBound {
    fn expires_at(&self) -> i64;

    fn not_before(&self) -> Option<i64>;
}

/// Registry (and notary) bearer token.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Claims {
    pub iss: String,
    #[serde(default)]
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    pub jti: String,
    #[serde(default)]
    pub access: Vec<ResourceActions>,
}

impl TimeBound for Claims {
    fn expires_at(&self) -> i64 {
        self.exp
    }

    fn not_before(&self) -> Option<i64> {
        Some(self.nbf)
    }
}

/// Legacy robot account token, presented as a Basic password.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RobotClaims {
    pub iss: String,
    pub id: i64,
    #[serde(default)]
    pub pid: i64,
    #[serde(default)]
    pub access: Vec<Policy>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl TimeBound for RobotClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }

    fn not_before(&self) -> Option<i64> {
        self.nbf
    }
}
