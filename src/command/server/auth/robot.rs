use std::sync::Arc;

use async_trait::async_trait;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use tracing::debug;

use crate::clock::Clock;
use crate::command::server::auth::{rejected, AuthRequest, CredentialGenerator};
use crate::command::server::request_ext::HeaderExt;
use crate::secret::constant_time_eq;
use crate::security::policy::RobotPermission;
use crate::security::principal::RobotAccount;
use crate::security::Principal;
use crate::store::RobotStore;
use crate::token::{RobotClaims, TokenSigner};

const HASH_ITERATIONS: u32 = 4096;
const HASH_LENGTH: usize = 16;

/// Salted hash stored for robot secrets: hex-encoded PBKDF2-HMAC-SHA256.
pub fn hash_secret(secret: &str, salt: &str) -> String {
    let mut hash = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt.as_bytes(), HASH_ITERATIONS, &mut hash);
    hex::encode(hash)
}

fn looks_like_jwt(password: &str) -> bool {
    password.split('.').count() == 3
}

/// Basic credentials of a robot account: its name and plaintext secret, or a
/// robot token issued by older releases.
pub struct RobotCredential {
    prefix: String,
    robots: Arc<dyn RobotStore>,
    signer: Arc<TokenSigner>,
    clock: Arc<dyn Clock>,
}

impl RobotCredential {
    pub fn new(
        prefix: &str,
        robots: Arc<dyn RobotStore>,
        signer: Arc<TokenSigner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prefix: prefix.to_string(),
            robots,
            signer,
            clock,
        }
    }

    async fn with_secret(&self, name: &str, secret: &str) -> Option<Principal> {
        let robot = match self.robots.get_robot_by_name(name).await {
            Ok(Some(robot)) => robot,
            Ok(None) => return rejected(self.name(), format!("unknown robot '{name}'")),
            Err(error) => return rejected(self.name(), error),
        };

        let hashed = hash_secret(secret, &robot.salt);
        if !constant_time_eq(hashed.as_bytes(), robot.secret.as_bytes()) {
            return rejected(self.name(), format!("wrong secret for '{name}'"));
        }
        if robot.disabled {
            return rejected(self.name(), format!("robot '{name}' is disabled"));
        }
        if robot.is_expired(self.clock.now().timestamp()) {
            return rejected(self.name(), format!("robot '{name}' has expired"));
        }

        let policies = robot
            .effective_permissions()
            .flat_map(RobotPermission::policies)
            .collect();

        Some(Principal::Robot(RobotAccount {
            id: robot.id,
            name: robot.name,
            project_id: robot.project_id,
            policies,
        }))
    }

    async fn with_legacy_token(&self, name: &str, token: &str) -> Option<Principal> {
        let claims = match self.signer.parse::<RobotClaims>(token, None) {
            Ok(claims) => claims,
            Err(error) => return rejected(self.name(), error),
        };

        let robot = match self.robots.get_robot_by_id(claims.id).await {
            Ok(Some(robot)) => robot,
            Ok(None) => return rejected(self.name(), "robot token refers to no robot"),
            Err(error) => return rejected(self.name(), error),
        };

        if robot.name != name {
            return rejected(self.name(), format!("robot token is not for '{name}'"));
        }
        if robot.disabled {
            return rejected(self.name(), format!("robot '{name}' is disabled"));
        }

        Some(Principal::Robot(RobotAccount {
            id: robot.id,
            name: robot.name,
            project_id: claims.pid,
            policies: claims.access,
        }))
    }
}

#[async_trait]
impl CredentialGenerator for RobotCredential {
    fn name(&self) -> &'static str {
        "robot"
    }

    async fn generate(&self, request: &AuthRequest<'_>) -> Option<Principal> {
        let (name, password) = request.parts.basic_auth()?;
        if !name.starts_with(&self.prefix) {
            return None;
        }

        if looks_like_jwt(&password) {
            debug!("Robot '{name}' presented a robot token");
            self.with_legacy_token(&name, &password).await
        } else {
            self.with_secret(&name, &password).await
        }
    }
}
