use std::env;

use anyhow::{Context, anyhow};

use worker::{WorkerConfig, server};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = WorkerConfig::parse(env::args().skip(1), |key| env::var(key).ok())
        .map_err(|e| anyhow!("{e}\nusage: worker [--pipe] [--idle-timeout SECS]"))?;

    server::run(&config).await.context("worker failed")?;
    Ok(())
}
