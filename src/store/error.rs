use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    NotFound(String),
    Duplicate(String),
    Backend(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound(what) => write!(f, "Not found: {what}"),
            Error::Duplicate(what) => write!(f, "Already exists: {what}"),
            Error::Backend(err) => write!(f, "Store backend error: {err}"),
        }
    }
}
