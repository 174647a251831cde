mod config;
mod utils;
mod modules;
#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;

use crate::config::{BotConfig, WatchMode};
use crate::utils::http_client::HttpClientFactory;
use crate::utils::logging;
use crate::modules::action::{BotContext, Responder};
use crate::modules::perception::{FundFetcher, RedditClient};
use crate::modules::watch::{poller, stream};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // 1. 配置与日志。任何启动失败都直接以非零状态退出，不重试
    let config = BotConfig::load().context("Failed to load bot configuration")?;
    logging::init(&config)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.mode,
        production = config.production,
        "Starting wertpapierbot..."
    );

    // 2. 会话初始化
    let client = HttpClientFactory::create()?;
    let reddit = RedditClient::connect(client.clone(), config.credentials.clone())
        .await
        .context("Reddit authentication failed")?;
    let ctx = Arc::new(BotContext::establish(Arc::new(reddit), &config.subreddit).await?);

    let fetcher = Arc::new(FundFetcher::new(client));
    let responder = Responder::new(ctx, fetcher);

    info!("✅ System initialized. Loop starting...");

    // 3. 主循环，没有正常退出路径
    match config.mode {
        WatchMode::Poll => {
            poller::run(&responder, Duration::from_secs(config.interval_sec), config.submission_limit).await
        }
        WatchMode::Stream => stream::run(&responder, Duration::from_secs(config.stream_poll_sec)).await,
    }

    Ok(())
}
