use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::BotConfig;

const DEV_FILTER: &str = "wertpapierbot=debug,info";
const PROD_FILTER: &str = "wertpapierbot=info,warn";

/// 默认过滤级别，`RUST_LOG` 优先
pub fn default_filter(production: bool) -> &'static str {
    if production { PROD_FILTER } else { DEV_FILTER }
}

/// 开发模式: 仅 stdout，debug 级别。生产模式: stdout + 日志文件，info 级别。
pub fn init(config: &BotConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config.production)));

    let file_layer = if config.production {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Cannot open log file {}", config.log_file))?;
        Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Logger already initialized")?;

    Ok(())
}
