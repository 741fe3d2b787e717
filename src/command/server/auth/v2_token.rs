use std::sync::Arc;

use async_trait::async_trait;

use crate::command::server::auth::{rejected, AuthRequest, CredentialGenerator};
use crate::command::server::request_ext::HeaderExt;
use crate::security::Principal;
use crate::token::{Claims, TokenSigner, REGISTRY_SERVICE};

/// Registry tokens minted by the token endpoint, replayed on `/v2/` paths.
pub struct RegistryBearer {
    signer: Arc<TokenSigner>,
}

impl RegistryBearer {
    pub fn new(signer: Arc<TokenSigner>) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl CredentialGenerator for RegistryBearer {
    fn name(&self) -> &'static str {
        "v2_token"
    }

    async fn generate(&self, request: &AuthRequest<'_>) -> Option<Principal> {
        if !request.is_registry_path() {
            return None;
        }
        let token = request.parts.bearer_token()?;

        match self
            .signer
            .parse::<Claims>(&token, Some(&[REGISTRY_SERVICE]))
        {
            Ok(claims) => Some(Principal::Token {
                subject: claims.sub,
                access: claims.access,
            }),
            Err(error) => rejected(self.name(), error),
        }
    }
}
