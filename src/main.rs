//! `func-runtime`: serve the example functions.

mod demo;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use func_runtime::config::{load_config, ConfigError, Overrides};
use func_runtime::observability::init_logging;
use func_runtime::{FunctionHandle, Mode, Runtime, RuntimeConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMode {
    Http,
    #[value(alias = "cloudevent")]
    Event,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Http => Mode::Http,
            CliMode::Event => Mode::Event,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "func-runtime", version, about = "Serve an example function over HTTP")]
struct Cli {
    /// Serve the static handler instead of instantiating the example object.
    #[arg(long = "static")]
    static_handler: bool,

    /// Serving mode; overrides the config file.
    #[arg(long, value_enum)]
    mode: Option<CliMode>,

    /// TOML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Comma-separated listen addresses; overrides config and LISTEN_ADDRESS.
    #[arg(long)]
    listen: Option<String>,
}

fn configure(cli: &Cli) -> Result<RuntimeConfig, ConfigError> {
    let overrides = Overrides {
        mode: cli.mode.map(Mode::from),
        listen_address: cli.listen.clone(),
    };
    load_config(cli.config.as_deref(), &overrides)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match configure(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("func-runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = config.mode.as_str(),
        static_handler = cli.static_handler,
        "func-runtime starting"
    );

    let function = if cli.static_handler {
        FunctionHandle::from_handler(demo::handle)
    } else {
        FunctionHandle::from_factory(demo::Counter::new)
    };

    let result = match Runtime::bind(function, config) {
        Ok(runtime) => runtime.serve().await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "func-runtime failed");
            ExitCode::FAILURE
        }
    }
}
