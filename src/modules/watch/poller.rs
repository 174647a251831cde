use anyhow::Result;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::modules::action::{Outcome, Responder};
use crate::modules::perception::structs::{Comment, Submission, Thing};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub submissions: usize,
    pub comments: usize,
    pub replied: usize,
}

/// 轮询模式：每轮重新扫描最新帖子的全部评论，不记录游标，完全依赖去重检查
pub async fn run(responder: &Responder, interval: Duration, limit: u32) {
    loop {
        let stats = sweep(responder, limit).await;
        info!(
            submissions = stats.submissions,
            comments = stats.comments,
            replied = stats.replied,
            "💤 Sweep done. Sleeping {}s...",
            interval.as_secs()
        );
        sleep(interval).await;
    }
}

pub async fn sweep(responder: &Responder, limit: u32) -> SweepStats {
    let ctx = responder.context();
    let mut stats = SweepStats::default();

    let submissions = match ctx.forum.new_submissions(&ctx.subreddit.name, limit).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to list submissions");
            return stats;
        }
    };

    for submission in &submissions {
        debug!(submission = %submission.id, title = %submission.title, "Parsing submission");
        match handle_submission(responder, submission).await {
            Ok((comments, replied)) => {
                stats.submissions += 1;
                stats.comments += comments;
                stats.replied += replied;
            }
            Err(e) => error!(submission = %submission.id, error = %e, "Failed to process submission"),
        }
    }
    stats
}

/// 广度优先遍历评论树，返回 (处理评论数, 回复数)
async fn handle_submission(responder: &Responder, submission: &Submission) -> Result<(usize, usize)> {
    let tree = responder.context().forum.comment_tree(submission).await?;

    let mut queue: VecDeque<Comment> = comments_of(tree).collect();
    let (mut seen, mut replied) = (0, 0);

    while let Some(comment) = queue.pop_front() {
        seen += 1;
        if let Outcome::Replied(_) = responder.handle(&comment).await {
            replied += 1;
        }
        // 已删除评论下的回复仍然要处理
        queue.extend(comments_of(comment.replies));
    }
    Ok((seen, replied))
}

fn comments_of(things: Vec<Thing>) -> impl Iterator<Item = Comment> {
    things.into_iter().filter_map(|t| match t {
        Thing::Comment(c) => Some(c),
        Thing::More(_) => None,
    })
}
