use std::{fmt, io};

#[derive(Debug)]
pub enum Error {
    Input(io::Error),
    InvalidSecret(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Input(err) => write!(f, "Failed to read secret: {err}"),
            Error::InvalidSecret(err) => write!(f, "Invalid robot secret: {err}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Input(err)
    }
}
