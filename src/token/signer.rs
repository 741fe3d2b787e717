use std::fs;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::token::claims::{Claims, TimeBound};
use crate::token::{libtrust, Config, Error, ResourceActions};

const ALGORITHM: Algorithm = Algorithm::RS256;
// iat/nbf are backdated to absorb clock drift between us and the registry
const ISSUE_SKEW_SECONDS: i64 = 10;
const LEEWAY_SECONDS: i64 = 60;
const JTI_LENGTH: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub struct MintedToken {
    pub token: String,
    pub expires_in: i64,
    pub issued_at: DateTime<Utc>,
}

pub struct TokenSigner {
    issuer: String,
    lifetime: Duration,
    key_id: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        let pem = fs::read_to_string(&config.private_key_path).map_err(|error| {
            Error::Key(format!(
                "Unable to read {}: {error}",
                config.private_key_path.display()
            ))
        })?;

        let signer = Self::from_pem(
            &pem,
            &config.issuer,
            Duration::minutes(config.expiration_minutes),
            clock,
        )?;
        info!(
            "Loaded token signing key {} from {}",
            signer.key_id,
            config.private_key_path.display()
        );

        Ok(signer)
    }

    pub fn from_pem(
        pem: &str,
        issuer: &str,
        lifetime: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|error| Error::Key(format!("Unable to decode RSA private key: {error}")))?;
        let public_key = private_key.to_public_key();

        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|error| Error::Key(format!("Unable to encode public key: {error}")))?;

        Ok(Self {
            issuer: issuer.to_string(),
            lifetime,
            key_id: libtrust::key_id(&public_key)?,
            encoding_key: EncodingKey::from_rsa_pem(pem.as_bytes())?,
            decoding_key: DecodingKey::from_rsa_pem(public_pem.as_bytes())?,
            clock,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<String, Error> {
        let mut header = Header::new(ALGORITHM);
        header.kid = Some(self.key_id.clone());

        encode(&header, claims, &self.encoding_key)
            .map_err(|error| Error::Signing(error.to_string()))
    }

    pub fn mint(
        &self,
        subject: &str,
        audience: &str,
        access: Vec<ResourceActions>,
    ) -> Result<MintedToken, Error> {
        let issued_at = self.clock.now() - Duration::seconds(ISSUE_SKEW_SECONDS);
        let expires_at = issued_at + self.lifetime;

        let claims = Claims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            aud: audience.to_string(),
            exp: expires_at.timestamp(),
            nbf: issued_at.timestamp(),
            iat: issued_at.timestamp(),
            jti: random_jti(),
            access,
        };

        Ok(MintedToken {
            token: self.sign(&claims)?,
            expires_in: self.lifetime.num_seconds(),
            issued_at,
        })
    }

    /// Verifies `raw` and returns its claims. Any audience in `audiences` is
    /// accepted; `None` skips the audience check.
    pub fn parse<C>(&self, raw: &str, audiences: Option<&[&str]>) -> Result<C, Error>
    where
        C: DeserializeOwned + TimeBound,
    {
        let header = decode_header(raw)?;
        if header.alg != ALGORITHM {
            return Err(Error::WrongAlgorithm(format!("{:?}", header.alg)));
        }
        if let Some(kid) = header.kid {
            if kid != self.key_id {
                return Err(Error::UnknownKey(kid));
            }
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[&self.issuer]);
        match audiences {
            Some(audiences) => validation.set_audience(audiences),
            None => validation.validate_aud = false,
        }

        let claims = decode::<C>(raw, &self.decoding_key, &validation)?.claims;

        let now = self.clock.now().timestamp();
        if claims.expires_at() < now - LEEWAY_SECONDS {
            debug!("Token expired at {}", claims.expires_at());
            return Err(Error::Expired);
        }
        if claims
            .not_before()
            .is_some_and(|not_before| not_before > now + LEEWAY_SECONDS)
        {
            return Err(Error::NotYetValid);
        }

        Ok(claims)
    }
}

fn random_jti() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(JTI_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;

    use super::*;
    use crate::clock::tests::ManualClock;
    use crate::security::policy::{Effect, Policy};
    use crate::security::Action;
    use crate::token::claims::RobotClaims;
    use crate::token::{NOTARY_SERVICE, REGISTRY_SERVICE};

    const KEY: &str = include_str!("../../testdata/token_key.pem");
    const OTHER_KEY: &str = include_str!("../../testdata/other_key.pem");
    const NOW: i64 = 1_700_000_000;

    fn signer(clock: Arc<ManualClock>) -> TokenSigner {
        TokenSigner::from_pem(KEY, "harbor-token-issuer", Duration::minutes(30), clock).unwrap()
    }

    fn access() -> Vec<ResourceActions> {
        vec![
            ResourceActions {
                kind: "repository".to_string(),
                name: "library/hello-world".to_string(),
                actions: vec!["pull".to_string(), "push".to_string()],
            },
            ResourceActions {
                kind: "registry".to_string(),
                name: "catalog".to_string(),
                actions: vec![],
            },
        ]
    }

    fn segments(token: &str) -> Vec<serde_json::Value> {
        token
            .split('.')
            .take(2)
            .map(|part| serde_json::from_slice(&URL_SAFE_NO_PAD.decode(part).unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_mint_populates_claims_and_header() {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let signer = signer(clock);

        let minted = signer.mint("alice", REGISTRY_SERVICE, access()).unwrap();
        assert_eq!(minted.expires_in, 1800);
        assert_eq!(minted.issued_at.timestamp(), NOW - 10);

        let parts = segments(&minted.token);
        assert_eq!(parts[0]["alg"], "RS256");
        assert_eq!(
            parts[0]["kid"],
            "VXCD:RE72:U6E3:DJLE:O66E:UKM4:QA66:ATR5:A4IJ:THWV:RWMB:AI4Q"
        );

        let claims = &parts[1];
        assert_eq!(claims["iss"], "harbor-token-issuer");
        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["aud"], "harbor-registry");
        assert_eq!(claims["iat"], NOW - 10);
        assert_eq!(claims["nbf"], NOW - 10);
        assert_eq!(claims["exp"], NOW - 10 + 1800);
        assert_eq!(claims["jti"].as_str().unwrap().len(), 16);
        assert_eq!(claims["access"][0]["actions"], json!(["pull", "push"]));
    }

    #[test]
    fn test_mint_then_parse_round_trip() {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let signer = signer(clock);

        let minted = signer.mint("alice", REGISTRY_SERVICE, access()).unwrap();
        let claims: Claims = signer
            .parse(&minted.token, Some(&[REGISTRY_SERVICE]))
            .unwrap();

        assert_eq!(claims.access, access());
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.aud, REGISTRY_SERVICE);
    }

    #[test]
    fn test_jti_is_unique() {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let signer = signer(clock);

        let first: Claims = {
            let minted = signer.mint("", REGISTRY_SERVICE, vec![]).unwrap();
            signer.parse(&minted.token, None).unwrap()
        };
        let second: Claims = {
            let minted = signer.mint("", REGISTRY_SERVICE, vec![]).unwrap();
            signer.parse(&minted.token, None).unwrap()
        };
        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn test_parse_rejects_wrong_audience() {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let signer = signer(clock);

        let minted = signer.mint("alice", NOTARY_SERVICE, access()).unwrap();
        let result = signer.parse::<Claims>(&minted.token, Some(&[REGISTRY_SERVICE]));
        assert_eq!(result, Err(Error::InvalidAudience));
    }

    #[test]
    fn test_parse_rejects_wrong_issuer() {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let signer = signer(clock.clone());
        let other =
            TokenSigner::from_pem(KEY, "someone-else", Duration::minutes(30), clock).unwrap();

        let minted = other.mint("alice", REGISTRY_SERVICE, vec![]).unwrap();
        let result = signer.parse::<Claims>(&minted.token, Some(&[REGISTRY_SERVICE]));
        assert_eq!(result, Err(Error::InvalidIssuer));
    }

    #[test]
    fn test_parse_rejects_expired_after_leeway() {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let signer = signer(clock.clone());
        let minted = signer.mint("alice", REGISTRY_SERVICE, vec![]).unwrap();

        // exp = NOW + 1790; leeway is 60 seconds
        clock.advance(Duration::seconds(1790 + 60));
        assert!(signer.parse::<Claims>(&minted.token, None).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(
            signer.parse::<Claims>(&minted.token, None),
            Err(Error::Expired)
        );
    }

    #[test]
    fn test_parse_rejects_not_yet_valid() {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let signer = signer(clock.clone());
        let minted = signer.mint("alice", REGISTRY_SERVICE, vec![]).unwrap();

        clock.advance(Duration::seconds(-200));
        assert_eq!(
            signer.parse::<Claims>(&minted.token, None),
            Err(Error::NotYetValid)
        );
    }

    #[test]
    fn test_parse_rejects_other_key() {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let signer = signer(clock.clone());
        let other = TokenSigner::from_pem(
            OTHER_KEY,
            "harbor-token-issuer",
            Duration::minutes(30),
            clock,
        )
        .unwrap();
        assert_ne!(other.key_id(), signer.key_id());

        let minted = other.mint("alice", REGISTRY_SERVICE, vec![]).unwrap();
        let result = signer.parse::<Claims>(&minted.token, None);
        assert!(matches!(result, Err(Error::UnknownKey(_))));
    }

    #[test]
    fn test_parse_rejects_forged_signature_without_kid() {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let signer = signer(clock.clone());
        let other = TokenSigner::from_pem(
            OTHER_KEY,
            "harbor-token-issuer",
            Duration::minutes(30),
            clock,
        )
        .unwrap();

        let claims = json!({"iss": "harbor-token-issuer", "aud": "harbor-registry", "sub": "admin",
            "exp": NOW + 600, "nbf": NOW, "iat": NOW, "jti": "x"});
        let token = encode(&Header::new(Algorithm::RS256), &claims, &other.encoding_key).unwrap();

        let result = signer.parse::<Claims>(&token, None);
        assert_eq!(result, Err(Error::BadSignature));
    }

    #[test]
    fn test_parse_rejects_algorithm_confusion() {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let signer = signer(clock);

        // HMAC keyed with the public key PEM, the classic RS256 -> HS256 swap
        let public_pem = RsaPrivateKey::from_pkcs1_pem(KEY)
            .unwrap()
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(signer.key_id().to_string());
        let claims = json!({"iss": "harbor-token-issuer", "aud": "harbor-registry", "sub": "admin",
            "exp": NOW + 600, "nbf": NOW, "iat": NOW, "jti": "x"});
        let token = encode(
            &header,
            &claims,
            &EncodingKey::from_secret(public_pem.as_bytes()),
        )
        .unwrap();

        let result = signer.parse::<Claims>(&token, Some(&[REGISTRY_SERVICE]));
        assert!(matches!(result, Err(Error::WrongAlgorithm(_))));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let signer = signer(clock);

        let result = signer.parse::<Claims>("not.a.token", None);
        assert!(matches!(result, Err(Error::Malformed(_)) | Err(Error::InvalidClaims(_))));
    }

    #[test]
    fn test_robot_claims_round_trip() {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let signer = signer(clock);

        let claims = RobotClaims {
            iss: "harbor-token-issuer".to_string(),
            id: 3,
            pid: 7,
            access: vec![Policy {
                resource: "/project/7/repository".to_string(),
                action: Action::Pull,
                effect: Effect::Allow,
            }],
            exp: NOW + 3600,
            nbf: None,
            iat: Some(NOW),
        };
        let token = signer.sign(&claims).unwrap();

        let parsed: RobotClaims = signer.parse(&token, None).unwrap();
        assert_eq!(parsed, claims);
    }

    #[test]
    fn test_new_reads_key_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(OTHER_KEY.as_bytes()).unwrap();

        let config = Config {
            private_key_path: file.path().to_path_buf(),
            expiration_minutes: 5,
            issuer: "harbor-token-issuer".to_string(),
        };
        let signer = TokenSigner::new(&config, Arc::new(ManualClock::at_epoch(NOW))).unwrap();
        let minted = signer.mint("bob", REGISTRY_SERVICE, vec![]).unwrap();
        assert_eq!(minted.expires_in, 300);

        let missing = Config {
            private_key_path: "/nonexistent/key.pem".into(),
            ..config
        };
        let result = TokenSigner::new(&missing, Arc::new(ManualClock::at_epoch(NOW)));
        assert!(matches!(result, Err(Error::Key(_))));
    }
}
