use std::{fmt, io};

use crate::command::{argon, robot_secret, server};
use crate::configuration;

#[derive(Debug)]
pub enum Error {
    IO(io::Error),
    Watcher(String),
    Configuration(configuration::Error),
    Server(server::Error),
    Argon(argon::Error),
    RobotSecret(robot_secret::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IO(err) => write!(f, "IO error: {err}"),
            Error::Watcher(err) => write!(f, "Watcher error: {err}"),
            Error::Configuration(err) => write!(f, "Configuration error: {err}"),
            Error::Server(err) => write!(f, "Server error: {err}"),
            Error::Argon(err) => write!(f, "Argon error: {err}"),
            Error::RobotSecret(err) => write!(f, "Robot secret error: {err}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IO(err)
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error::Watcher(err.to_string())
    }
}

impl From<configuration::Error> for Error {
    fn from(err: configuration::Error) -> Self {
        Error::Configuration(err)
    }
}

impl From<server::Error> for Error {
    fn from(err: server::Error) -> Self {
        Error::Server(err)
    }
}

impl From<argon::Error> for Error {
    fn from(err: argon::Error) -> Self {
        Error::Argon(err)
    }
}

impl From<robot_secret::Error> for Error {
    fn from(err: robot_secret::Error) -> Self {
        Error::RobotSecret(err)
    }
}
