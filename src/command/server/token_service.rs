//! `GET /service/token`: the Docker Registry v2 token endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::command::server::error::Error;
use crate::metrics_provider::TOKENS_ISSUED;
use crate::security::SecurityContext;
use crate::store::ProjectStore;
use crate::token::image::{BasicParser, EndpointPrefixedParser};
use crate::token::{
    parse_scopes, AccessFilter, MintedToken, TokenSigner, NOTARY_SERVICE, REGISTRY_SERVICE,
};

/// Query of a token request; `scope` may repeat.
#[derive(Debug, Default, PartialEq)]
pub struct TokenRequest {
    pub service: Option<String>,
    pub scopes: Vec<String>,
    pub account: Option<String>,
}

impl TokenRequest {
    pub fn from_query(pairs: Vec<(String, String)>) -> Self {
        let mut request = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "service" => request.service = Some(value),
                "scope" => request.scopes.push(value),
                "account" => request.account = Some(value),
                _ => {}
            }
        }
        request
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
    pub issued_at: String,
}

impl From<MintedToken> for TokenResponse {
    fn from(minted: MintedToken) -> Self {
        Self {
            token: minted.token,
            expires_in: minted.expires_in,
            issued_at: minted.issued_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

/// One access filter per audience the endpoint can mint tokens for.
pub struct TokenService {
    creators: HashMap<&'static str, AccessFilter>,
    signer: Arc<TokenSigner>,
    projects: Arc<dyn ProjectStore>,
}

impl TokenService {
    pub fn new(
        ext_endpoint: Option<&str>,
        signer: Arc<TokenSigner>,
        projects: Arc<dyn ProjectStore>,
    ) -> Self {
        let mut creators = HashMap::new();
        creators.insert(REGISTRY_SERVICE, AccessFilter::new(Box::new(BasicParser)));

        match ext_endpoint {
            Some(endpoint) => {
                creators.insert(
                    NOTARY_SERVICE,
                    AccessFilter::new(Box::new(EndpointPrefixedParser::new(endpoint))),
                );
            }
            None => info!("No external endpoint configured, notary tokens are disabled"),
        }

        Self {
            creators,
            signer,
            projects,
        }
    }

    #[instrument(skip(self, ctx))]
    pub async fn issue(
        &self,
        ctx: &SecurityContext,
        request: &TokenRequest,
    ) -> Result<TokenResponse, Error> {
        let service = request.service.as_deref().unwrap_or_default();
        let Some((&service, filter)) = self.creators.get_key_value(service) else {
            debug!("Token requested for unknown service '{service}'");
            return Err(Error::BadRequest("unknown service".to_string()));
        };

        if !ctx.is_authenticated() && request.scopes.is_empty() {
            return Err(Error::LoginRequired);
        }

        let mut access = parse_scopes(&request.scopes);
        filter.filter(ctx, &*self.projects, &mut access).await?;

        let minted = self.signer.mint(ctx.username(), service, access)?;
        TOKENS_ISSUED.with_label_values(&[service]).inc();

        Ok(minted.into())
    }
}
