use sales_dashboard::app;
use sales_dashboard::config::load_config;
use std::env;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional config file path as the only argument
    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;

    log::info!(
        "Starting sales dashboard on {} (top {}, table {})",
        config.server.bind,
        config.dashboard.top_n,
        config.dashboard.table_capacity
    );
    app::run(config).await?;

    Ok(())
}
