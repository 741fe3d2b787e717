use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tracing::{debug, info};

use crate::command::server::error::Error;
use crate::command::server::http_server::serve_request;
use crate::command::server::listeners::{accept, build_listener};
use crate::command::server::ServerContext;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "Config::default_bind_address")]
    pub bind_address: IpAddr,
    #[serde(default = "Config::default_port")]
    pub port: u16,
    /// Seconds a single request may take before the connection is dropped.
    #[serde(default = "Config::default_query_timeout")]
    pub query_timeout: u64,
    #[serde(default = "Config::default_query_timeout_grace_period")]
    pub query_timeout_grace_period: u64,
}

impl Config {
    fn default_bind_address() -> IpAddr {
        IpAddr::from(Ipv4Addr::UNSPECIFIED)
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_query_timeout() -> u64 {
        3600
    }

    fn default_query_timeout_grace_period() -> u64 {
        60
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: Self::default_bind_address(),
            port: Self::default_port(),
            query_timeout: Self::default_query_timeout(),
            query_timeout_grace_period: Self::default_query_timeout_grace_period(),
        }
    }
}

/// Plain HTTP listener; TLS is terminated by the fronting proxy.
pub struct InsecureListener {
    binding_address: SocketAddr,
    context: ArcSwap<ServerContext>,
    timeouts: ArcSwap<[Duration; 2]>,
}

impl InsecureListener {
    pub fn new(server_config: &Config, context: ServerContext) -> Self {
        let binding_address = SocketAddr::new(server_config.bind_address, server_config.port);

        Self {
            binding_address,
            context: ArcSwap::from_pointee(context),
            timeouts: ArcSwap::from_pointee(Self::timeouts(server_config)),
        }
    }

    fn timeouts(server_config: &Config) -> [Duration; 2] {
        [
            Duration::from_secs(server_config.query_timeout),
            Duration::from_secs(server_config.query_timeout_grace_period),
        ]
    }

    /// Swaps the context used by connections accepted from now on.
    pub fn notify_config_change(&self, server_config: &Config, context: ServerContext) {
        self.context.store(Arc::new(context));
        self.timeouts.store(Arc::new(Self::timeouts(server_config)));
    }

    pub async fn serve(&self) -> Result<(), Error> {
        info!("Listening on {}", self.binding_address);
        let listener = build_listener(self.binding_address).await?;

        loop {
            let (tcp, remote_address) = accept(&listener).await?;

            debug!("Serving connection from {remote_address}");
            let stream = TokioIo::new(tcp);
            let context = Arc::clone(&self.context.load());
            let timeouts = Arc::clone(&self.timeouts.load());

            tokio::spawn(Box::pin(serve_request(stream, context, timeouts)));
        }
    }
}
