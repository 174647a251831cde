use futures_util::{stream, Stream, StreamExt};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::modules::action::Responder;
use crate::modules::perception::forum::Forum;
use crate::modules::perception::structs::Comment;

/// 每次拉取的评论数 (Reddit 上限)
const FETCH_LIMIT: u32 = 100;
/// 记住最近见过的评论数量
const SEEN_CAPACITY: usize = 301;

/// 容量有限的已见集合，满了淘汰最旧的
struct SeenSet {
    order: VecDeque<String>,
    set: HashSet<String>,
    capacity: usize,
}

impl SeenSet {
    fn new(capacity: usize) -> Self {
        Self { order: VecDeque::with_capacity(capacity), set: HashSet::with_capacity(capacity), capacity }
    }

    /// 新元素返回 true
    fn insert(&mut self, key: &str) -> bool {
        if self.set.contains(key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        self.order.push_back(key.to_string());
        self.set.insert(key.to_string());
        true
    }
}

/// 版块新评论的实时流。启动时已存在的评论不会重放，每条评论只产出一次。
pub struct CommentFeed {
    forum: Arc<dyn Forum>,
    subreddit: String,
    pause: Duration,
    seen: SeenSet,
    pending: VecDeque<Comment>,
    /// 已成功拉取过一批，之后的评论才算新评论
    primed: bool,
    /// 已经请求过一次，后续请求之间需要间隔
    polled: bool,
}

impl CommentFeed {
    pub fn new(forum: Arc<dyn Forum>, subreddit: &str, pause: Duration) -> Self {
        Self {
            forum,
            subreddit: subreddit.to_string(),
            pause,
            seen: SeenSet::new(SEEN_CAPACITY),
            pending: VecDeque::new(),
            primed: false,
            polled: false,
        }
    }

    pub async fn next_comment(&mut self) -> Comment {
        loop {
            if let Some(comment) = self.pending.pop_front() {
                return comment;
            }
            if self.polled {
                sleep(self.pause).await;
            }
            self.poll().await;
        }
    }

    async fn poll(&mut self) {
        self.polled = true;
        let batch = match self.forum.latest_comments(&self.subreddit, FETCH_LIMIT).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "Failed to poll comment stream");
                return;
            }
        };

        let mut fresh: Vec<Comment> = batch.into_iter().filter(|c| self.seen.insert(&c.fullname)).collect();
        if !self.primed {
            debug!(skipped = fresh.len(), "Skipping existing comments");
            self.primed = true;
            return;
        }

        // 列表新的在前，按创建时间正序产出
        fresh.reverse();
        fresh.sort_by_key(|c| c.created);
        self.pending.extend(fresh);
    }

    pub fn into_stream(self) -> impl Stream<Item = Comment> {
        stream::unfold(self, |mut feed| async move {
            let comment = feed.next_comment().await;
            Some((comment, feed))
        })
    }
}

/// 实时模式：每条新评论只处理一次
pub async fn run(responder: &Responder, pause: Duration) {
    let ctx = responder.context();
    info!(subreddit = %ctx.subreddit.name, "📡 Watching comment stream");

    let comments = CommentFeed::new(ctx.forum.clone(), &ctx.subreddit.name, pause).into_stream();
    futures_util::pin_mut!(comments);

    while let Some(comment) = comments.next().await {
        debug!(comment = %comment.fullname, "Parsing comment");
        responder.handle(&comment).await;
    }
}
