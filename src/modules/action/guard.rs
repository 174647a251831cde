use anyhow::Result;

use super::context::BotContext;
use crate::modules::perception::structs::{Comment, Thing};

/// 向服务器重新拉取回复列表，判断机器人是否已经回复过。
/// 不保存本地记录，论坛本身就是唯一的事实来源。
pub async fn already_replied(ctx: &BotContext, comment: &Comment) -> Result<bool> {
    let replies = ctx.forum.refresh_replies(comment).await?;
    let replied = replies.iter().any(|reply| match reply {
        Thing::Comment(c) => c.is_by(&ctx.account),
        // 未展开的占位符不是真实评论
        Thing::More(_) => false,
    });
    Ok(replied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::perception::structs::MoreComments;
    use crate::testing::{bot_comment, comment, context, FakeForum};
    use std::sync::Arc;

    #[tokio::test]
    async fn detects_bot_reply_by_account_id() {
        let forum = Arc::new(FakeForum::default());
        forum.replies.lock().unwrap().insert("t1_c1".into(), vec![
            Thing::More(MoreComments { parent_id: "t1_c1".into(), children: vec!["m".into()], count: 1 }),
            Thing::Comment(bot_comment("r1", "**Fund**")),
        ]);
        let ctx = context(forum.clone()).await;

        assert!(already_replied(&ctx, &comment("c1", Some("alice"), "!FUND: ETF110")).await.unwrap());
        assert!(!already_replied(&ctx, &comment("c2", Some("alice"), "!FUND: ETF110")).await.unwrap());
        assert_eq!(*forum.refresh_calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn display_name_alone_is_not_the_bot() {
        let forum = Arc::new(FakeForum::default());
        // 同名但账号 id 不同
        forum.replies.lock().unwrap().insert("t1_c1".into(), vec![
            Thing::Comment(comment("r1", Some("WertpapierBot"), "ich bin kein Bot")),
        ]);
        let ctx = context(forum).await;

        assert!(!already_replied(&ctx, &comment("c1", Some("alice"), "!FUND: ETF110")).await.unwrap());
    }

    #[tokio::test]
    async fn refresh_errors_propagate() {
        let forum = Arc::new(FakeForum { fail_refresh: true, ..Default::default() });
        let ctx = context(forum).await;

        assert!(already_replied(&ctx, &comment("c1", Some("alice"), "!FUND: ETF110")).await.is_err());
    }
}
