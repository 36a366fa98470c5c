use plugin_rpc_bridge::{config::Config, logging};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;

    info!(
        module = %config.module,
        transport = ?config.transport,
        "bridge starting"
    );

    plugin_rpc_bridge::run(config).await?;
    Ok(())
}
