use std::{fmt, io};

use opentelemetry_otlp::ExporterBuildError;
use tracing::debug;

use crate::{cache, token};

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    ConfigurationFileFormat(String),
    MissingSection(String),
    InvalidValue(String),
    Cache(cache::Error),
    Token(token::Error),
    Http(String),
    ExporterInit(ExporterBuildError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {err}"),
            Error::ConfigurationFileFormat(error) => {
                write!(f, "Configuration file format error: {error}")
            }
            Error::MissingSection(section) => {
                write!(f, "Missing expected configuration section: {section}")
            }
            Error::InvalidValue(error) => write!(f, "Invalid configuration value: {error}"),
            Error::Cache(err) => write!(f, "Cache error: {err}"),
            Error::Token(err) => write!(f, "Token service error: {err}"),
            Error::Http(error) => write!(f, "HTTP client error: {error}"),
            Error::ExporterInit(error) => write!(f, "Exporter initialization error: {error}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        debug!("TOML error: {error}");
        Error::ConfigurationFileFormat(error.to_string())
    }
}

impl From<cache::Error> for Error {
    fn from(error: cache::Error) -> Self {
        Error::Cache(error)
    }
}

impl From<token::Error> for Error {
    fn from(error: token::Error) -> Self {
        Error::Token(error)
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Http(error.to_string())
    }
}

impl From<ExporterBuildError> for Error {
    fn from(error: ExporterBuildError) -> Self {
        Error::ExporterInit(error)
    }
}
