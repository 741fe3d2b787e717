use std::fmt;

use jsonwebtoken::errors::ErrorKind;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Malformed(String),
    BadSignature,
    WrongAlgorithm(String),
    UnknownKey(String),
    Expired,
    NotYetValid,
    InvalidIssuer,
    InvalidAudience,
    InvalidClaims(String),
    Key(String),
    Signing(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Malformed(err) => write!(f, "Malformed token: {err}"),
            Error::BadSignature => write!(f, "Token signature verification failed"),
            Error::WrongAlgorithm(alg) => write!(f, "Unexpected signing algorithm: {alg}"),
            Error::UnknownKey(kid) => write!(f, "Unknown signing key: {kid}"),
            Error::Expired => write!(f, "Token expired"),
            Error::NotYetValid => write!(f, "Token not yet valid"),
            Error::InvalidIssuer => write!(f, "Invalid token issuer"),
            Error::InvalidAudience => write!(f, "Invalid token audience"),
            Error::InvalidClaims(err) => write!(f, "Invalid token claims: {err}"),
            Error::Key(err) => write!(f, "Signing key error: {err}"),
            Error::Signing(err) => write!(f, "Token signing failed: {err}"),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        match error.kind() {
            ErrorKind::InvalidSignature => Error::BadSignature,
            ErrorKind::InvalidAlgorithm => Error::WrongAlgorithm(error.to_string()),
            ErrorKind::ExpiredSignature => Error::Expired,
            ErrorKind::ImmatureSignature => Error::NotYetValid,
            ErrorKind::InvalidIssuer => Error::InvalidIssuer,
            ErrorKind::InvalidAudience => Error::InvalidAudience,
            ErrorKind::MissingRequiredClaim(claim) => {
                Error::InvalidClaims(format!("missing '{claim}'"))
            }
            ErrorKind::Json(err) => Error::InvalidClaims(err.to_string()),
            ErrorKind::InvalidRsaKey(err) => Error::Key(err.clone()),
            ErrorKind::InvalidKeyFormat => Error::Key(error.to_string()),
            _ => Error::Malformed(error.to_string()),
        }
    }
}
