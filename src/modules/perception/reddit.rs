use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::forum::Forum;
use super::structs::{strip_kind, Account, Comment, MoreComments, Submission, Subreddit, Thing};
use crate::config::bot_config::Credentials;

const AUTH_BASE: &str = "https://www.reddit.com";
const API_BASE: &str = "https://oauth.reddit.com";
/// morechildren 每次最多接受 100 个 id
const MORE_CHILDREN_BATCH: usize = 100;

pub struct RedditClient {
    client: Client,
    credentials: Credentials,
    auth_base: String,
    api_base: String,
    token_cache: Arc<Mutex<(String, u64)>>,
}

impl RedditClient {
    pub fn new(client: Client, credentials: Credentials) -> Self {
        Self::with_endpoints(client, credentials, AUTH_BASE, API_BASE)
    }

    pub fn with_endpoints(client: Client, credentials: Credentials, auth_base: &str, api_base: &str) -> Self {
        Self {
            client,
            credentials,
            auth_base: auth_base.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token_cache: Arc::new(Mutex::new(("".to_string(), 0))),
        }
    }

    /// 登录并确认会话可以发帖。只读会话直接失败。
    pub async fn connect(client: Client, credentials: Credentials) -> Result<Self> {
        let reddit = Self::new(client, credentials);
        reddit.authenticate().await?;
        Ok(reddit)
    }

    pub async fn authenticate(&self) -> Result<()> {
        let scope = self.refresh_token().await?;
        if !scope.split_whitespace().any(|s| s == "*" || s == "submit") {
            bail!("Reddit session is read-only (scope: {})", scope);
        }
        Ok(())
    }

    async fn get_access_token(&self) -> Result<String> {
        {
            let cache = self.token_cache.lock().await;
            let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
            if !cache.0.is_empty() && cache.1 > now + 60 {
                return Ok(cache.0.clone());
            }
        }
        self.refresh_token().await?;
        Ok(self.token_cache.lock().await.0.clone())
    }

    /// 密码模式获取 token，返回授权 scope
    async fn refresh_token(&self) -> Result<String> {
        let url = format!("{}/api/v1/access_token", self.auth_base);
        let params = [
            ("grant_type", "password"),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
        ];

        let resp = self.client.post(&url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&params)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow!("Token request failed. Status: {}", resp.status()));
        }

        let json: Value = resp.json().await?;
        if let Some(err) = json["error"].as_str() {
            bail!("Token request rejected: {}", err);
        }
        let access_token = json["access_token"].as_str().context("No access_token")?.to_string();
        let expires_in = json["expires_in"].as_u64().unwrap_or(3600);
        let scope = json["scope"].as_str().unwrap_or_default().to_string();

        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        *self.token_cache.lock().await = (access_token, now + expires_in);
        debug!(scope = %scope, "Reddit token refreshed");
        Ok(scope)
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let token = self.get_access_token().await?;
        let url = format!("{}{}", self.api_base, path);
        let resp = self.client.get(&url)
            .bearer_auth(token)
            .query(&[("raw_json", "1")])
            .query(query)
            .send()
            .await?;

        if !resp.status().is_success() {
            bail!("GET {} failed. Status: {}", path, resp.status());
        }
        Ok(resp.json().await?)
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<Value> {
        let token = self.get_access_token().await?;
        let url = format!("{}{}", self.api_base, path);
        let resp = self.client.post(&url)
            .bearer_auth(token)
            .form(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            bail!("POST {} failed. Status: {}", path, resp.status());
        }
        Ok(resp.json().await?)
    }

    /// `/comments/<article>?comment=<id>` 返回 [帖子, 以该评论为根的评论树]
    async fn comment_subtree(&self, link_id: &str, comment_id: &str) -> Result<Option<Comment>> {
        let path = format!("/comments/{}", strip_kind(link_id));
        let json = self.get_json(&path, &[("comment", comment_id), ("sort", "new")]).await?;
        let root = Thing::parse_listing(&json[1]).into_iter().find_map(|t| match t {
            Thing::Comment(c) if c.id == comment_id => Some(c),
            _ => None,
        });
        Ok(root)
    }

    async fn more_children(&self, link_id: &str, children: &[String]) -> Result<Vec<Thing>> {
        let mut things = Vec::new();
        for batch in children.chunks(MORE_CHILDREN_BATCH) {
            let ids = batch.join(",");
            let json = self.get_json("/api/morechildren", &[
                ("api_type", "json"),
                ("link_id", link_id),
                ("children", ids.as_str()),
                ("sort", "new"),
            ]).await?;
            if let Some(items) = json["json"]["data"]["things"].as_array() {
                things.extend(items.iter().filter_map(Thing::from_json));
            }
        }
        Ok(things)
    }

    /// 反复展开所有 "more" 占位符，直到树中不再有占位符
    async fn expand_all(&self, link_id: &str, tree: &mut Vec<Thing>) -> Result<()> {
        loop {
            let placeholders = take_placeholders(tree);
            if placeholders.is_empty() {
                return Ok(());
            }
            let hidden: u64 = placeholders.iter().map(|m| m.count).sum();
            debug!(link_id, placeholders = placeholders.len(), hidden, "Expanding more-comments placeholders");

            for more in placeholders {
                let fetched = if more.is_continue_thread() {
                    // "continue this thread": 重新拉取父评论的子树
                    let parent = strip_kind(&more.parent_id).to_string();
                    match self.comment_subtree(link_id, &parent).await? {
                        Some(root) => root.replies,
                        None => Vec::new(),
                    }
                } else {
                    self.more_children(link_id, &more.children).await?
                };
                attach(tree, link_id, fetched);
            }
        }
    }
}

/// 从整棵树中摘除所有占位符
fn take_placeholders(things: &mut Vec<Thing>) -> Vec<MoreComments> {
    let mut taken = Vec::new();
    things.retain(|t| match t {
        Thing::More(m) => {
            taken.push(m.clone());
            false
        }
        Thing::Comment(_) => true,
    });
    for thing in things.iter_mut() {
        if let Thing::Comment(c) = thing {
            taken.extend(take_placeholders(&mut c.replies));
        }
    }
    taken
}

fn find_comment_mut<'a>(things: &'a mut [Thing], fullname: &str) -> Option<&'a mut Comment> {
    for thing in things.iter_mut() {
        if let Thing::Comment(c) = thing {
            if c.fullname == fullname {
                return Some(c);
            }
            if let Some(found) = find_comment_mut(&mut c.replies, fullname) {
                return Some(found);
            }
        }
    }
    None
}

/// 按 parent_id 把扁平列表挂回树上。morechildren 的结果中父节点总在子节点之前。
fn attach(tree: &mut Vec<Thing>, link_id: &str, fetched: Vec<Thing>) {
    for thing in fetched {
        let parent = thing.parent_id().to_string();
        if parent == link_id {
            tree.push(thing);
        } else if let Some(comment) = find_comment_mut(tree, &parent) {
            comment.replies.push(thing);
        } else {
            debug!(parent = %parent, "Dropping orphaned thing from expansion");
        }
    }
}

#[async_trait]
impl Forum for RedditClient {
    async fn me(&self) -> Result<Account> {
        let json = self.get_json("/api/v1/me", &[]).await?;
        Ok(Account {
            id: json["id"].as_str().context("No account id in /api/v1/me")?.to_string(),
            name: json["name"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn resolve_subreddit(&self, name: &str) -> Result<Subreddit> {
        let json = self.get_json(&format!("/r/{}/about", name), &[]).await
            .with_context(|| format!("Subreddit r/{} could not be resolved", name))?;
        if json["kind"].as_str() != Some("t5") {
            bail!("r/{} is not a subreddit", name);
        }
        let data = &json["data"];
        Ok(Subreddit {
            name: data["display_name"].as_str().unwrap_or(name).to_string(),
            fullname: data["name"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn new_submissions(&self, subreddit: &str, limit: u32) -> Result<Vec<Submission>> {
        let limit = limit.to_string();
        let json = self.get_json(&format!("/r/{}/new", subreddit), &[("limit", limit.as_str())]).await?;
        let submissions = json["data"]["children"]
            .as_array()
            .map(|children| children.iter().filter_map(|c| Submission::from_json(&c["data"])).collect())
            .unwrap_or_default();
        Ok(submissions)
    }

    async fn comment_tree(&self, submission: &Submission) -> Result<Vec<Thing>> {
        let json = self.get_json(
            &format!("/comments/{}", submission.id),
            &[("sort", "new"), ("limit", "500")],
        ).await?;
        let mut tree = Thing::parse_listing(&json[1]);
        self.expand_all(&submission.fullname, &mut tree).await?;
        Ok(tree)
    }

    async fn latest_comments(&self, subreddit: &str, limit: u32) -> Result<Vec<Comment>> {
        let limit = limit.to_string();
        let json = self.get_json(&format!("/r/{}/comments", subreddit), &[("limit", limit.as_str())]).await?;
        let comments = Thing::parse_listing(&json)
            .into_iter()
            .filter_map(|t| match t {
                Thing::Comment(c) => Some(c),
                Thing::More(_) => None,
            })
            .collect();
        Ok(comments)
    }

    async fn refresh_replies(&self, comment: &Comment) -> Result<Vec<Thing>> {
        let root = self.comment_subtree(&comment.link_id, &comment.id).await?
            .with_context(|| format!("Comment {} not found on refresh", comment.fullname))?;
        Ok(root.replies)
    }

    async fn reply(&self, comment: &Comment, text: &str) -> Result<String> {
        let json = self.post_form("/api/comment", &[
            ("api_type", "json"),
            ("thing_id", comment.fullname.as_str()),
            ("text", text),
        ]).await?;

        if let Some(errors) = json["json"]["errors"].as_array() {
            if !errors.is_empty() {
                bail!("Reply to {} rejected: {}", comment.fullname, Value::Array(errors.clone()));
            }
        }
        let id = json["json"]["data"]["things"][0]["data"]["id"]
            .as_str()
            .context("No id in reply response")?
            .to_string();
        info!(comment = %comment.fullname, reply = %id, "Posted reply");
        Ok(id)
    }
}
