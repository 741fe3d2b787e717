use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use crate::command::server::auth::{rejected, AuthRequest, CredentialGenerator};
use crate::command::server::request_ext::HeaderExt;
use crate::proxy_cache::SecretManager;
use crate::security::Principal;

const SCHEME: &str = "Proxy-Cache-Secret";

static ARTIFACT_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/v2/(?P<repository>.+?)/(?:manifests|blobs|tags)/").unwrap()
});

/// Repository addressed by a registry artifact path.
pub fn artifact_repository(path: &str) -> Option<&str> {
    ARTIFACT_PATH_RE
        .captures(path)
        .and_then(|captures| captures.name("repository"))
        .map(|repository| repository.as_str())
}

pub struct ProxyCacheSecret {
    secrets: Arc<SecretManager>,
}

impl ProxyCacheSecret {
    pub fn new(secrets: Arc<SecretManager>) -> Self {
        Self { secrets }
    }
}

#[async_trait]
impl CredentialGenerator for ProxyCacheSecret {
    fn name(&self) -> &'static str {
        "proxy_cache"
    }

    async fn generate(&self, request: &AuthRequest<'_>) -> Option<Principal> {
        let repository = artifact_repository(request.path())?;
        let secret = request.parts.authorization(SCHEME)?;

        if self.secrets.verify(&secret, repository) {
            Some(Principal::ProxyCache {
                repository: repository.to_string(),
            })
        } else {
            rejected(self.name(), format!("invalid secret for '{repository}'"))
        }
    }
}
