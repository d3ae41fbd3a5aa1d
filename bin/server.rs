// Stock Snowflake - Web Server
// Configuration comes from the environment (see `Settings::from_env`)

use stock_snowflake::{logging, server, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing("stock_snowflake=info,tower_http=info");

    let settings = Settings::from_env()?;
    server::run_server(settings).await
}
