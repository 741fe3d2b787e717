use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::command::server::error::Error;

pub mod insecure;

async fn build_listener(binding_address: SocketAddr) -> Result<TcpListener, Error> {
    TcpListener::bind(binding_address).await.map_err(|err| {
        Error::Initialization(format!("Failed to bind to {binding_address}: {err}"))
    })
}

async fn accept(listener: &TcpListener) -> Result<(TcpStream, SocketAddr), Error> {
    match listener.accept().await {
        Ok((stream, remote_address)) => {
            debug!("Accepted connection from {remote_address}");
            Ok((stream, remote_address))
        }
        Err(err) => Err(Error::Internal(format!(
            "Failed to accept incoming connection: {err}"
        ))),
    }
}
