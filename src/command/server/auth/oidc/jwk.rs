use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::server::error::Error;

/// Signing key published by the identity provider.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kty")]
pub enum Jwk {
    #[serde(rename = "RSA")]
    Rsa {
        #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
        key_use: Option<String>,
        #[serde(default)]
        kid: Option<String>,
        #[serde(default)]
        alg: Option<String>,
        n: String,
        e: String,
    },
    #[serde(rename = "EC")]
    Ec {
        #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
        key_use: Option<String>,
        #[serde(default)]
        kid: Option<String>,
        #[serde(default)]
        alg: Option<String>,
        x: String,
        y: String,
    },
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Key for a token header: matched by `kid`, or the only key when the header has none.
    pub fn find(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self.keys.iter().find(|key| key.kid() == Some(kid)),
            None if self.keys.len() == 1 => self.keys.first(),
            None => None,
        }
    }
}

impl Jwk {
    pub fn kid(&self) -> Option<&str> {
        match self {
            Jwk::Rsa { kid, .. } | Jwk::Ec { kid, .. } => kid.as_deref(),
        }
    }

    /// Whether a token signed with `alg` may be checked against this key.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        match self {
            Jwk::Rsa { .. } => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            Jwk::Ec { .. } => matches!(alg, Algorithm::ES256 | Algorithm::ES384),
        }
    }

    pub fn to_decoding_key(&self) -> Result<DecodingKey, Error> {
        match self {
            Jwk::Rsa { n, e, kid, .. } => {
                debug!("Building RSA key from JWK kid={kid:?}");
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| Error::Unauthorized(format!("unusable RSA key: {e}")))
            }
            Jwk::Ec { x, y, kid, .. } => {
                debug!("Building EC key from JWK kid={kid:?}");
                DecodingKey::from_ec_components(x, y)
                    .map_err(|e| Error::Unauthorized(format!("unusable EC key: {e}")))
            }
        }
    }
}
