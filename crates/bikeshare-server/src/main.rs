use bikeshare_core::{BikeService, ShutdownSignal};
use bikeshare_schema::Variant;
use bikeshare_server::{bind, load_config_file, run_server, ServerConfig, ServerError};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "bikeshare-server", about = "Bike catalog and reservation HTTP server")]
struct Cli {
    /// TOML config file. Flags given on the command line override it.
    #[arg(long, env = "BIKESHARE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on [default: 8080].
    #[arg(long, env = "BIKESHARE_PORT")]
    port: Option<u16>,

    /// Address to bind [default: 0.0.0.0].
    #[arg(long, env = "BIKESHARE_BIND")]
    bind: Option<String>,

    /// Directory for persistent data. Omit to keep everything in memory.
    #[arg(long, env = "BIKESHARE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Storage variant: hash, validated-hash or document [default: document].
    #[arg(long, env = "BIKESHARE_VARIANT")]
    variant: Option<Variant>,

    /// Number of worker threads [default: 4].
    #[arg(long, env = "BIKESHARE_WORKERS")]
    workers: Option<usize>,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig, ServerError> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = Some(dir);
        }
        if let Some(variant) = self.variant {
            config.variant = variant;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(cli: Cli) -> Result<(), ServerError> {
    let config = cli.into_config()?;

    let service = Arc::new(BikeService::open(config.variant, config.data_dir.as_deref())?);
    let shutdown = ShutdownSignal::new();
    shutdown
        .install_handler()
        .map_err(|e| ServerError::Signal(e.to_string()))?;

    let addr = config.addr();
    let server = Arc::new(bind(&addr)?);
    info!("starting bikeshare-server on {addr}");
    info!("variant: {}", config.variant.as_str());
    match &config.data_dir {
        Some(dir) => info!("data directory: {}", dir.display()),
        None => info!("data directory: none (in-memory store)"),
    }

    run_server(service, server, config.workers, shutdown)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
