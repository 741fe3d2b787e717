use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hyper::header::{AsHeaderName, AUTHORIZATION, COOKIE};
use hyper::http::request::Parts;
use tracing::debug;

pub trait HeaderExt {
    fn get_header<K: AsHeaderName>(&self, header: K) -> Option<String>;
    /// Credentials of the `Authorization` header for the given scheme, e.g. `Bearer`.
    fn authorization(&self, scheme: &str) -> Option<String>;
    fn bearer_token(&self) -> Option<String>;
    fn basic_auth(&self) -> Option<(String, String)>;
    fn cookie(&self, name: &str) -> Option<String>;
    fn query_pairs(&self) -> Vec<(String, String)>;
}

impl HeaderExt for Parts {
    fn get_header<K>(&self, header: K) -> Option<String>
    where
        K: AsHeaderName,
    {
        self.headers
            .get(header)
            .and_then(|header| header.to_str().ok())
            .map(ToString::to_string)
    }

    fn authorization(&self, scheme: &str) -> Option<String> {
        let authorization = self.get_header(AUTHORIZATION)?;
        let (found, credentials) = authorization.split_once(' ')?;
        if !found.eq_ignore_ascii_case(scheme) {
            return None;
        }

        let credentials = credentials.trim();
        (!credentials.is_empty()).then(|| credentials.to_string())
    }

    fn bearer_token(&self) -> Option<String> {
        self.authorization("Bearer")
    }

    fn basic_auth(&self) -> Option<(String, String)> {
        let value = self.authorization("Basic")?;
        let value = BASE64_STANDARD.decode(value).ok()?;
        let value = String::from_utf8(value).ok()?;

        let (username, password) = value.split_once(':')?;
        Some((username.to_string(), password.to_string()))
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        let Some(query) = self.uri.query() else {
            return Vec::new();
        };

        serde_urlencoded::from_str(query).unwrap_or_else(|error| {
            debug!("Ignoring malformed query string: {error}");
            Vec::new()
        })
    }
}
