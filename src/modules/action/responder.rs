use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::composer::compose_reply;
use super::context::BotContext;
use super::guard;
use crate::modules::perception::fund::{InstrumentRecord, InstrumentSource};
use crate::modules::perception::scanner::scan;
use crate::modules::perception::structs::Comment;

/// 单条评论的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NoAuthor,
    OwnComment,
    NoCommand,
    AlreadyReplied,
    /// 无法确认是否已回复，保守地跳过
    GuardFailed,
    NothingFetched,
    Replied(String),
    ReplyFailed,
}

/// 扫描 -> 去重 -> 抓取 -> 组装 -> 发帖
pub struct Responder {
    ctx: Arc<BotContext>,
    source: Arc<dyn InstrumentSource>,
}

impl Responder {
    pub fn new(ctx: Arc<BotContext>, source: Arc<dyn InstrumentSource>) -> Self {
        Self { ctx, source }
    }

    pub fn context(&self) -> &BotContext {
        &self.ctx
    }

    /// 所有失败都在这里记录并吞掉，循环不会因单条评论中断
    pub async fn handle(&self, comment: &Comment) -> Outcome {
        let Some(author) = &comment.author else {
            return Outcome::NoAuthor;
        };
        if comment.is_by(&self.ctx.account) {
            return Outcome::OwnComment;
        }

        let matches = scan(&comment.body);
        if matches.is_empty() {
            return Outcome::NoCommand;
        }
        debug!(comment = %comment.fullname, author = %author.name, depth = comment.depth, ?matches, "Stock ids found");

        match guard::already_replied(&self.ctx, comment).await {
            Ok(true) => {
                debug!(comment = %comment.fullname, "Already replied, skipping");
                return Outcome::AlreadyReplied;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(comment = %comment.fullname, error = %e, "Could not check existing replies");
                return Outcome::GuardFailed;
            }
        }

        let records = self.fetch_all(&matches).await;
        let Some(message) = compose_reply(&records) else {
            warn!(comment = %comment.fullname, ?matches, "No fund data gathered, not replying");
            return Outcome::NothingFetched;
        };

        match self.ctx.forum.reply(comment, &message).await {
            Ok(id) => {
                info!(comment = %comment.fullname, reply = %id, funds = records.len(), "Replied to fund request");
                Outcome::Replied(id)
            }
            Err(e) => {
                error!(comment = %comment.fullname, error = %e, "Failed to post reply");
                Outcome::ReplyFailed
            }
        }
    }

    /// 逐个顺序抓取，失败的标识符记录后跳过
    async fn fetch_all(&self, identifiers: &[String]) -> Vec<InstrumentRecord> {
        let mut records = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            match self.source.fetch(identifier).await {
                Ok(record) => records.push(record),
                Err(e) => error!(identifier = %identifier, error = %e, "An error occurred while gathering funds data"),
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::perception::structs::Thing;
    use crate::testing::{bot_comment, comment, context, FakeForum, FakeSource};

    async fn responder(forum: Arc<FakeForum>, source: Arc<FakeSource>) -> Responder {
        Responder::new(context(forum).await, source)
    }

    #[tokio::test]
    async fn comment_without_author_never_reaches_fetcher() {
        let forum = Arc::new(FakeForum::default());
        let source = Arc::new(FakeSource::with(&["ETF110"]));
        let responder = responder(forum.clone(), source.clone()).await;

        let outcome = responder.handle(&comment("c1", None, "!FUND: ETF110")).await;

        assert_eq!(outcome, Outcome::NoAuthor);
        assert!(source.calls().is_empty());
        assert_eq!(*forum.refresh_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn replies_with_blocks_in_match_order() {
        let forum = Arc::new(FakeForum::default());
        let source = Arc::new(FakeSource::with(&["ETF110", "LU0468897110"]));
        let responder = responder(forum.clone(), source.clone()).await;

        let body = "!FUND: LU0468897110\n!FUND: ETF110";
        let outcome = responder.handle(&comment("c1", Some("alice"), body)).await;

        assert!(matches!(outcome, Outcome::Replied(_)));
        assert_eq!(source.calls(), vec!["ETF110", "LU0468897110"]);
        let posted = forum.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "t1_c1");
        let text = &posted[0].1;
        assert!(text.find("**Fund ETF110**").unwrap() < text.find("**Fund LU0468897110**").unwrap());
    }

    #[tokio::test]
    async fn existing_bot_reply_prevents_second_fetch() {
        let forum = Arc::new(FakeForum::default());
        let source = Arc::new(FakeSource::with(&["ETF110"]));
        let responder = responder(forum.clone(), source.clone()).await;
        let request = comment("c1", Some("alice"), "!FUND: ETF110");

        assert!(matches!(responder.handle(&request).await, Outcome::Replied(_)));
        assert_eq!(responder.handle(&request).await, Outcome::AlreadyReplied);

        assert_eq!(source.calls(), vec!["ETF110"]);
        assert_eq!(forum.posted().len(), 1);
    }

    #[tokio::test]
    async fn placeholders_and_other_authors_do_not_count_as_replied() {
        let forum = Arc::new(FakeForum::default());
        forum.replies.lock().unwrap().insert("t1_c1".into(), vec![
            Thing::Comment(comment("x", Some("WertpapierBot_fan"), "danke")),
            Thing::More(crate::modules::perception::structs::MoreComments {
                parent_id: "t1_c1".into(),
                children: vec!["y".into()],
                count: 1,
            }),
        ]);
        let source = Arc::new(FakeSource::with(&["ETF110"]));
        let responder = responder(forum.clone(), source.clone()).await;

        let outcome = responder.handle(&comment("c1", Some("alice"), "!FUND: ETF110")).await;
        assert!(matches!(outcome, Outcome::Replied(_)));
    }

    #[tokio::test]
    async fn total_fetch_failure_posts_nothing() {
        let forum = Arc::new(FakeForum::default());
        let source = Arc::new(FakeSource::default());
        let responder = responder(forum.clone(), source.clone()).await;

        let outcome = responder.handle(&comment("c1", Some("alice"), "!FUND: ETF110\n!FUND: A0RPWH")).await;

        assert_eq!(outcome, Outcome::NothingFetched);
        assert_eq!(source.calls().len(), 2);
        assert!(forum.posted().is_empty());
    }

    #[tokio::test]
    async fn partial_failure_still_replies() {
        let forum = Arc::new(FakeForum::default());
        let source = Arc::new(FakeSource::with(&["A0RPWH"]));
        let responder = responder(forum.clone(), source.clone()).await;

        let outcome = responder.handle(&comment("c1", Some("alice"), "!FUND: ETF110\n!FUND: A0RPWH")).await;

        assert!(matches!(outcome, Outcome::Replied(_)));
        let text = &forum.posted()[0].1;
        assert!(text.contains("**Fund A0RPWH**"));
        assert!(!text.contains("**Fund ETF110**"));
    }

    #[tokio::test]
    async fn guard_failure_skips_comment() {
        let forum = Arc::new(FakeForum { fail_refresh: true, ..Default::default() });
        let source = Arc::new(FakeSource::with(&["ETF110"]));
        let responder = responder(forum.clone(), source.clone()).await;

        let outcome = responder.handle(&comment("c1", Some("alice"), "!FUND: ETF110")).await;

        assert_eq!(outcome, Outcome::GuardFailed);
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn reply_failure_is_contained() {
        let forum = Arc::new(FakeForum { fail_reply: true, ..Default::default() });
        let source = Arc::new(FakeSource::with(&["ETF110"]));
        let responder = responder(forum.clone(), source.clone()).await;

        let outcome = responder.handle(&comment("c1", Some("alice"), "!FUND: ETF110")).await;
        assert_eq!(outcome, Outcome::ReplyFailed);
    }

    #[tokio::test]
    async fn ignores_own_comments_and_plain_text() {
        let forum = Arc::new(FakeForum::default());
        let source = Arc::new(FakeSource::with(&["ETF110"]));
        let responder = responder(forum.clone(), source.clone()).await;

        assert_eq!(responder.handle(&bot_comment("b1", "!FUND: ETF110")).await, Outcome::OwnComment);
        assert_eq!(responder.handle(&comment("c2", Some("alice"), "Was haltet ihr vom DAX?")).await, Outcome::NoCommand);
        assert!(source.calls().is_empty());
    }
}
