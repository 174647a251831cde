use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::modules::perception::forum::Forum;
use crate::modules::perception::structs::{Account, Subreddit};

/// 启动时构建一次的会话上下文，替代全局变量
pub struct BotContext {
    pub forum: Arc<dyn Forum>,
    pub account: Account,
    pub subreddit: Subreddit,
}

impl BotContext {
    /// 解析自身账号和目标版块。任何失败都应让进程退出。
    pub async fn establish(forum: Arc<dyn Forum>, subreddit: &str) -> Result<Self> {
        let account = forum.me().await.context("Could not resolve bot account")?;
        let subreddit = forum.resolve_subreddit(subreddit).await?;
        info!(
            account = %account.name,
            subreddit = %subreddit.name,
            subreddit_id = %subreddit.fullname,
            "✅ Bot context established"
        );
        Ok(Self { forum, account, subreddit })
    }
}
