#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use std::sync::Arc;

use argh::FromArgs;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use crate::command::{argon, robot_secret, server};
use crate::configuration::watcher::ConfigWatcher;
use crate::configuration::{Configuration, ObservabilityConfig};

mod cache;
mod clock;
mod command;
mod configuration;
mod metrics_provider;
mod proxy_cache;
mod secret;
mod security;
mod session;
mod store;
mod token;

fn set_tracing(config: Option<&ObservabilityConfig>) -> Result<(), configuration::Error> {
    let fmt_layer = tracing_subscriber::fmt::layer().json();

    if let Some(tracing_config) = config.and_then(|config| config.tracing.as_ref()) {
        let resource = Resource::builder()
            .with_service_name(env!("CARGO_PKG_NAME"))
            .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
            .build();
        let otlp_exporter = SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&tracing_config.endpoint)
            .with_timeout(std::time::Duration::from_secs(10))
            .build()?;

        let tracer_provider = SdkTracerProvider::builder()
            .with_batch_exporter(otlp_exporter)
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(resource)
            .with_sampler(Sampler::TraceIdRatioBased(tracing_config.sampling_rate))
            .build();

        let tracer = tracer_provider.tracer(env!("CARGO_PKG_NAME"));
        let _ = global::set_tracer_provider(tracer_provider);
        let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

        let _ = tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(fmt_layer)
            .with(telemetry)
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(fmt_layer)
            .try_init();
    }
    Ok(())
}

#[derive(FromArgs, PartialEq, Debug)]
/// Authentication and authorization service for a container registry
struct GlobalArguments {
    #[argh(option, short = 'c', default = "String::from(\"config.toml\")")]
    /// the path to the configuration file, defaults to `config.toml`
    config: String,

    #[argh(subcommand)]
    subcommand: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommand {
    Argon(argon::Options),
    RobotSecret(robot_secret::Options),
    Server(server::Options),
}

fn main() -> Result<(), command::Error> {
    let cli_args: GlobalArguments = argh::from_env();

    match cli_args.subcommand {
        SubCommand::Argon(_) => Ok(argon::Command::run()?),
        SubCommand::RobotSecret(_) => Ok(robot_secret::Command::run()?),
        SubCommand::Server(_) => {
            let config = Configuration::load(&cli_args.config)?;

            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(run_server(cli_args.config, config))
        }
    }
}

async fn run_server(config_path: String, config: Configuration) -> Result<(), command::Error> {
    set_tracing(config.observability.as_ref())?;

    let server = Arc::new(server::Command::new(&config)?);
    let _watcher = ConfigWatcher::new(&config_path, server.clone())?;
    server.run().await?;
    Ok(())
}
