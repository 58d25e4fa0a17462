//! Roster API Server
//!
//! REST API server for Roster user management.
//!
//! Author: hephaex@gmail.com

use roster_core::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional TOML file, then environment overrides
    let config_path = std::env::var("ROSTER_CONFIG").ok();
    let config = AppConfig::load(config_path.as_deref().map(std::path::Path::new))?;

    roster_api::init_tracing(&config.logging)?;

    roster_api::serve(config).await
}
