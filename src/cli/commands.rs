use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser};
use tracing::info;

use crate::model::Model;
use crate::raml::RamlModel;
use crate::server::{AppService, FastCgiServer, Host, StandaloneServer};
use crate::telemetry;

#[derive(Parser)]
#[command(name = "cmdgate")]
#[command(about = "Serve an API model as a REST gateway over command-line tools", long_about = None)]
pub struct Cli {
    /// TCP port to listen on; an empty value serves FastCGI on stdin
    #[arg(long, default_value = "http")]
    pub port: String,

    /// Absolute path to certificate file
    #[arg(long, default_value = "")]
    pub cert: String,

    /// Absolute path to key file
    #[arg(long, default_value = "")]
    pub key: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Path to the API model
    pub model: PathBuf,
}

pub fn run_cli() -> Result<()> {
    // bare invocation prints usage instead of failing on the missing
    // model argument
    if std::env::args().len() <= 1 {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    let cli = Cli::parse();
    telemetry::init_logging(&cli.log_level)?;

    // request handling runs on coroutines; the default stack is too
    // small for template rendering plus process spawning
    may::config().set_stack_size(0x10000);

    let model = load_model(&cli.model)?;
    info!(model = model.name(), "model loaded");
    let service = AppService::new(model);

    let mut host: Box<dyn Host> = if cli.port.is_empty() {
        info!("starting FastCGI process");
        Box::new(FastCgiServer::new(service))
    } else {
        let addr = format!("0.0.0.0:{}", cli.port);
        info!(%addr, "starting standalone server");
        let mut server = StandaloneServer::new(addr, service);
        if !cli.cert.is_empty() && !cli.key.is_empty() {
            server = server.with_tls(PathBuf::from(&cli.cert), PathBuf::from(&cli.key));
        }
        Box::new(server)
    };

    host.run(false)
}

/// Pick a model loader from the file extension.
fn load_model(path: &Path) -> Result<Arc<dyn Model>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("raml" | "yaml" | "yml") => Ok(Arc::new(RamlModel::from_file(path)?)),
        other => bail!(
            "Unsupported API description format: {}",
            other.unwrap_or("<none>")
        ),
    }
}
