use reqwest::Client;
use std::time::Duration;
use anyhow::Result;
use tracing::info;

/// Reddit 要求描述性的 User-Agent
pub const USER_AGENT: &str = concat!("rust:wertpapierbot:", env!("CARGO_PKG_VERSION"), " (by /u/SebRut)");

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// 创建通用 HTTP Client，Reddit API 和基金网站共用
    pub fn create() -> Result<Client> {
        // 单线程处理评论，卡住的请求会阻塞整个循环，所以必须有超时
        let builder = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(30)));

        info!(user_agent = USER_AGENT, "🌐 [Http Client] initialized");

        let client = builder.build()?;
        Ok(client)
    }
}
