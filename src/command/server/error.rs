use std::fmt;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::{Response, StatusCode};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::token::filter;
use crate::{cache, configuration, store, token};

pub const BASIC_CHALLENGE: &str = r#"Basic realm="harbor""#;

#[derive(Debug, PartialEq)]
pub enum Error {
    Initialization(String),
    Internal(String),
    BadRequest(String),
    Unauthorized(String),
    /// Credentials are needed before anything can be answered; the body stays empty.
    LoginRequired,
    Forbidden(String),
    NotFound(String),
    MethodNotAllowed,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Initialization(err) => write!(f, "{err}"),
            Error::Internal(err) => write!(f, "Internal Server Error: {err}"),
            Error::BadRequest(err) => write!(f, "Bad Request: {err}"),
            Error::Unauthorized(err) => write!(f, "Unauthorized: {err}"),
            Error::LoginRequired => write!(f, "Unauthorized"),
            Error::Forbidden(err) => write!(f, "Forbidden: {err}"),
            Error::NotFound(err) => write!(f, "Not Found: {err}"),
            Error::MethodNotAllowed => write!(f, "Method Not Allowed"),
        }
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Initialization(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) | Error::LoginRequired => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Error::Initialization(_) | Error::Internal(_) => "INTERNAL_SERVER_ERROR",
            Error::BadRequest(_) => "BAD_REQUEST",
            Error::Unauthorized(_) | Error::LoginRequired => "UNAUTHORIZED",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::NotFound(_) => "NOT_FOUND",
            Error::MethodNotAllowed => "METHOD_NOT_ALLOWED",
        }
    }

    pub fn as_json(&self, request_id: Option<&str>) -> serde_json::Value {
        let message = match self {
            Error::Initialization(msg)
            | Error::Internal(msg)
            | Error::BadRequest(msg)
            | Error::Unauthorized(msg)
            | Error::Forbidden(msg)
            | Error::NotFound(msg) => msg.as_str(),
            Error::LoginRequired => "authentication required",
            Error::MethodNotAllowed => "method not allowed",
        };

        if let Some(request_id) = request_id {
            json!({
                "errors": [{
                    "code": self.code(),
                    "message": message,
                    "detail": { "request_id": request_id }
                }]
            })
        } else {
            json!({
                "errors": [{
                    "code": self.code(),
                    "message": message,
                }]
            })
        }
    }

    pub fn to_response(&self, request_id: Option<&str>) -> Response<Full<Bytes>> {
        let body = match self {
            Error::LoginRequired => Bytes::new(),
            _ => Bytes::from(self.as_json(request_id).to_string()),
        };

        let mut response = Response::new(Full::new(body));
        *response.status_mut() = self.status_code();

        let headers = response.headers_mut();
        if !matches!(self, Error::LoginRequired) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if matches!(self, Error::Unauthorized(_) | Error::LoginRequired) {
            headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
        }

        response
    }
}

impl From<configuration::Error> for Error {
    fn from(error: configuration::Error) -> Self {
        Error::Initialization(error.to_string())
    }
}

impl From<store::Error> for Error {
    fn from(error: store::Error) -> Self {
        error!("Store error: {error}");
        Error::Internal("Store error during operations".to_string())
    }
}

impl From<cache::Error> for Error {
    fn from(error: cache::Error) -> Self {
        error!("Cache error: {error}");
        Error::Internal("Cache error during operations".to_string())
    }
}

impl From<token::Error> for Error {
    fn from(error: token::Error) -> Self {
        error!("Token error: {error}");
        Error::Internal("Unable to issue token".to_string())
    }
}

impl From<filter::Error> for Error {
    fn from(error: filter::Error) -> Self {
        match error {
            filter::Error::BadScope(reason) => {
                debug!("Rejected scope: {reason}");
                Error::BadRequest("invalid scope".to_string())
            }
            filter::Error::Store(error) => error.into(),
        }
    }
}

impl From<hyper::Error> for Error {
    fn from(error: hyper::Error) -> Self {
        warn!("Hyper error: {error}");
        Error::BadRequest("Unable to read request".to_string())
    }
}

impl From<hyper::http::Error> for Error {
    fn from(error: hyper::http::Error) -> Self {
        error!("HTTP error: {error}");
        Error::Internal("HTTP error during operations".to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        error!("JSON error: {error}");
        Error::Internal("(De)Serialization error during operations".to_string())
    }
}
