//! querybridge - Thanos query API in front of a Prometheus HTTP API
//!
//! Entry point for the bridge daemon. Responsible for:
//! - Loading configuration from file or environment variables
//! - Building the backend client
//! - Running the gRPC and HTTP listeners until a signal or failure

use anyhow::Result;
use querybridge_config::BridgeConfig;

mod app;
use app::App;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let argv: Vec<String> = std::env::args().collect();

    // "querybridge" reads the environment only, "querybridge config.yaml" layers a file under it
    let config = match argv.len() {
        1 => BridgeConfig::new()?,
        _ => BridgeConfig::from_file(&argv[1])?,
    };
    let app = App::new(config)?;

    println!(".:: Starting querybridge ::.");
    app.run().await?;
    println!(".:: querybridge stopped. Goodbye ::.");

    Ok(())
}
