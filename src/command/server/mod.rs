pub mod auth;
mod command;
pub mod error;
mod handlers;
mod http_server;
pub mod listeners;
mod request_ext;
mod router;
mod server_context;
mod token_service;

pub use command::{Command, Options};
pub use error::Error;
pub use server_context::ServerContext;
