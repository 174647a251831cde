use anyhow::Result;
use async_trait::async_trait;

use super::structs::{Account, Comment, Submission, Subreddit, Thing};

/// 论坛 API 协作方。机器人只消费这些操作。
#[async_trait]
pub trait Forum: Send + Sync {
    /// 当前登录账号
    async fn me(&self) -> Result<Account>;

    async fn resolve_subreddit(&self, name: &str) -> Result<Subreddit>;

    /// 最新 `limit` 个帖子
    async fn new_submissions(&self, subreddit: &str, limit: u32) -> Result<Vec<Submission>>;

    /// 帖子的完整评论树，所有 "more" 占位符都已展开
    async fn comment_tree(&self, submission: &Submission) -> Result<Vec<Thing>>;

    /// 版块内最新评论，新的在前
    async fn latest_comments(&self, subreddit: &str, limit: u32) -> Result<Vec<Comment>>;

    /// 从服务器重新拉取评论的直接回复
    async fn refresh_replies(&self, comment: &Comment) -> Result<Vec<Thing>>;

    /// 回复评论，返回新评论 id
    async fn reply(&self, comment: &Comment, text: &str) -> Result<String>;
}
