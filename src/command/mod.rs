pub mod argon;
mod error;
pub mod robot_secret;
pub mod server;

pub use error::Error;
