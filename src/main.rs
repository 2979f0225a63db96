//! telnet-shell server binary.
//!
//! Serves the built-in commands (`help`, `quit`, `test`).
//! Configuration via CLI arguments or TOML file.

use telnet_shell::shell::builtin;
use telnet_shell::{Config, Server};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        max_sessions = config.max_sessions,
        compression = config.offer_compression,
        "Starting telnet-shell"
    );

    let server = Server::bind(&config, builtin::commands()?)?;
    if let Err(e) = server.run() {
        error!(error = %e, "Fatal error, shutting down");
        return Err(e.into());
    }
    Ok(())
}
