//! 测试替身: 内存中的论坛和基金数据源

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::modules::action::context::BotContext;
use crate::modules::perception::forum::Forum;
use crate::modules::perception::fund::{FetchError, InstrumentRecord, InstrumentSource};
use crate::modules::perception::structs::{Account, Author, Comment, Submission, Subreddit, Thing};

pub fn bot_account() -> Account {
    Account { id: "bot".into(), name: "WertpapierBot".into() }
}

pub fn comment(id: &str, author: Option<&str>, body: &str) -> Comment {
    Comment {
        id: id.to_string(),
        fullname: format!("t1_{}", id),
        link_id: "t3_s1".into(),
        parent_id: "t3_s1".into(),
        author: author.map(|name| Author { name: name.to_string(), id: Some(format!("t2_{}", name)) }),
        body: body.to_string(),
        depth: 0,
        created: None,
        replies: Vec::new(),
    }
}

pub fn bot_comment(id: &str, body: &str) -> Comment {
    let mut c = comment(id, Some("bot"), body);
    c.author = Some(Author { name: "WertpapierBot".into(), id: Some(bot_account().fullname()) });
    c
}

pub fn record(identifier: &str) -> InstrumentRecord {
    InstrumentRecord {
        name: format!("Fund {}", identifier),
        isin: "DE000ETFL011".into(),
        wkn: identifier.to_string(),
        currency: "EUR".into(),
        distributing: "Ja".into(),
        ter: "0.15%".into(),
        domicile: "Deutschland".into(),
        replication: "Vollständig replizierend".into(),
        description: format!("Beschreibung {}", identifier),
        source_url: format!("https://www.etfinfo.com/de/product/{}", identifier),
        comparison_url: "https://www.justetf.com/de/etf-profile.html?isin=DE000ETFL011".into(),
    }
}

#[derive(Default)]
pub struct FakeForum {
    pub submissions: Vec<Submission>,
    pub trees: HashMap<String, Vec<Thing>>,
    /// 按评论全名记录的已有回复，发帖后也会写入这里
    pub replies: Mutex<HashMap<String, Vec<Thing>>>,
    pub latest: Mutex<VecDeque<Result<Vec<Comment>>>>,
    pub posted: Mutex<Vec<(String, String)>>,
    pub refresh_calls: Mutex<usize>,
    pub fail_refresh: bool,
    pub fail_reply: bool,
}

impl FakeForum {
    pub fn posted(&self) -> Vec<(String, String)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Forum for FakeForum {
    async fn me(&self) -> Result<Account> {
        Ok(bot_account())
    }

    async fn resolve_subreddit(&self, name: &str) -> Result<Subreddit> {
        if name == "missing" {
            bail!("r/{} could not be resolved", name);
        }
        Ok(Subreddit { name: name.to_string(), fullname: "t5_test".into() })
    }

    async fn new_submissions(&self, _subreddit: &str, limit: u32) -> Result<Vec<Submission>> {
        Ok(self.submissions.iter().take(limit as usize).cloned().collect())
    }

    async fn comment_tree(&self, submission: &Submission) -> Result<Vec<Thing>> {
        match self.trees.get(&submission.id) {
            Some(tree) => Ok(tree.clone()),
            None => bail!("submission {} unavailable", submission.id),
        }
    }

    async fn latest_comments(&self, _subreddit: &str, _limit: u32) -> Result<Vec<Comment>> {
        self.latest.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn refresh_replies(&self, comment: &Comment) -> Result<Vec<Thing>> {
        *self.refresh_calls.lock().unwrap() += 1;
        if self.fail_refresh {
            bail!("refresh failed");
        }
        Ok(self.replies.lock().unwrap().get(&comment.fullname).cloned().unwrap_or_default())
    }

    async fn reply(&self, comment: &Comment, text: &str) -> Result<String> {
        if self.fail_reply {
            bail!("RATELIMIT");
        }
        let mut posted = self.posted.lock().unwrap();
        let id = format!("r{}", posted.len());
        posted.push((comment.fullname.clone(), text.to_string()));
        self.replies
            .lock()
            .unwrap()
            .entry(comment.fullname.clone())
            .or_default()
            .push(Thing::Comment(bot_comment(&id, text)));
        Ok(id)
    }
}

/// 记录调用顺序的基金数据源，未知标识符返回 NotFound
#[derive(Default)]
pub struct FakeSource {
    pub known: HashMap<String, InstrumentRecord>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with(identifiers: &[&str]) -> Self {
        Self {
            known: identifiers.iter().map(|id| (id.to_string(), record(id))).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InstrumentSource for FakeSource {
    async fn fetch(&self, identifier: &str) -> Result<InstrumentRecord, FetchError> {
        self.calls.lock().unwrap().push(identifier.to_string());
        self.known
            .get(identifier)
            .cloned()
            .ok_or_else(|| FetchError::NotFound { identifier: identifier.to_string() })
    }
}

pub async fn context(forum: Arc<FakeForum>) -> Arc<BotContext> {
    Arc::new(BotContext::establish(forum, "finanzen").await.unwrap())
}
