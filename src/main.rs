// Main

mod amf;
mod log;
mod rtmp;
mod server;
mod session;
mod utils;

use std::sync::Arc;

use log::{LogConfig, Logger};
use server::{run_server, RtmpServerConfiguration, RtmpServerStatus};
use tokio::sync::Mutex;

/// Main function
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load .env
    let _ = dotenvy::dotenv();

    // Initialize logger

    let logger = Logger::new(LogConfig::load_from_env());

    // Initialize server status

    let server_status = Arc::new(Mutex::new(RtmpServerStatus::new()));

    // Print version

    const VERSION: &str = env!("CARGO_PKG_VERSION");

    logger.log_info(&format!("MasterStream RTMP Server ({VERSION})"));

    // Load configuration

    let server_config = match RtmpServerConfiguration::load_from_env(&logger) {
        Ok(c) => Arc::new(c),
        Err(_) => {
            std::process::exit(1);
        }
    };

    // Run server

    run_server(logger, server_config, server_status).await;

    // End of main

    Ok(())
}
