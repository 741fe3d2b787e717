use std::path::PathBuf;

use serde::Deserialize;

pub mod claims;
mod error;
pub mod filter;
pub mod image;
mod libtrust;
mod scope;
mod signer;

pub use claims::{Claims, RobotClaims};
pub use error::Error;
pub use filter::AccessFilter;
pub use scope::{parse_scopes, ResourceActions};
pub use signer::{MintedToken, TokenSigner};

pub const REGISTRY_SERVICE: &str = "harbor-registry";
pub const NOTARY_SERVICE: &str = "harbor-notary";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub private_key_path: PathBuf,
    #[serde(default = "Config::default_expiration_minutes")]
    pub expiration_minutes: i64,
    #[serde(default = "Config::default_issuer")]
    pub issuer: String,
}

impl Config {
    fn default_expiration_minutes() -> i64 {
        30
    }

    fn default_issuer() -> String {
        "harbor-token-issuer".to_string()
    }
}
