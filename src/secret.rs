use std::fmt;

use serde::Deserialize;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Sensitive configuration value: shared service secrets, client secrets, key passphrases.
///
/// Zeroed on drop and never printed by `Debug`.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize + AsRef<[u8]>> Secret<T> {
    /// Compares against `candidate` in time independent of where the first difference is.
    pub fn matches(&self, candidate: &str) -> bool {
        constant_time_eq(self.0.as_ref(), candidate.as_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_ref().is_empty()
    }
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Zeroize + Default> Default for Secret<T> {
    fn default() -> Self {
        Self(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = Secret::new("core-secret".to_string());
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
    }

    #[test]
    fn test_matches() {
        let secret = Secret::new("core-secret".to_string());
        assert!(secret.matches("core-secret"));
        assert!(!secret.matches("core-secreT"));
        assert!(!secret.matches("core"));
        assert!(!secret.matches(""));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"610c137a", b"610c137a"));
        assert!(!constant_time_eq(b"610c137a", b"610c137b"));
        assert!(!constant_time_eq(b"610c137a", b"610c13"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_deserialize_list() {
        #[derive(Debug, Deserialize)]
        struct Config {
            secrets: Vec<Secret<String>>,
        }

        let config: Config = toml::from_str(r#"secrets = ["a1", "b2"]"#).unwrap();
        assert_eq!(config.secrets.len(), 2);
        assert_eq!(config.secrets[1].expose(), "b2");
        assert!(Secret::<String>::default().is_empty());
    }
}
