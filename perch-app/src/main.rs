use anyhow::Result;
use perch_common::observability::LogConfig;
use perch_common::observability::init_logging;
use perch_config::{PerchConfig, PerchConfigLoader};

mod run;

#[tokio::main]
async fn main() -> Result<()> {
    // 1) Load config (env wins)
    let cfg: PerchConfig = PerchConfigLoader::new().with_file("perch.yaml").load()?;

    init_logging(LogConfig::default())?;

    run::run(cfg).await
}
