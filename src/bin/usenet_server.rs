use std::error::Error;

use clap::Parser;
use log::{error, info};
use usenet_sim::protocol::{DEFAULT_PORT, ServerConfig, UsenetServer, load_or_seed};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Interface to listen on
    #[arg(long, env = "USENET_HOST", default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[arg(long, env = "USENET_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ServerConfig::new(cli.host, cli.port).with_env();
    let store = load_or_seed(&config.backup);
    let server = UsenetServer::bind(&config, store)?;

    let shutdown = server.shutdown_handle();
    let handler = server.shutdown_handle();
    ctrlc::set_handler(move || handler.trigger())?;
    info!("press CTRL-C to stop");

    let result = server.listen();
    // No-op when the listener already flushed.
    shutdown.flush_backup();
    if let Err(e) = &result {
        error!("server stopped with error: {e}");
    }
    Ok(result?)
}
