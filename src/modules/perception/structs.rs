use chrono::{DateTime, Utc};
use serde_json::Value;

/// 评论作者。`id` 为稳定的账号全名 (`t2_xxxx`)，显示名可能变化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub fullname: String,
    /// 所属帖子全名 (`t3_xxxx`)
    pub link_id: String,
    /// 父节点全名，顶层评论为帖子全名
    pub parent_id: String,
    pub author: Option<Author>,
    pub body: String,
    pub depth: u32,
    pub created: Option<DateTime<Utc>>,
    pub replies: Vec<Thing>,
}

/// "load more comments" 占位符。`children` 为空时表示 "continue this thread"。
#[derive(Debug, Clone)]
pub struct MoreComments {
    pub parent_id: String,
    pub children: Vec<String>,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub enum Thing {
    Comment(Comment),
    More(MoreComments),
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub id: String,
    pub fullname: String,
    pub title: String,
}

/// 机器人自身账号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub name: String,
}

impl Account {
    pub fn fullname(&self) -> String {
        format!("t2_{}", self.id)
    }
}

#[derive(Debug, Clone)]
pub struct Subreddit {
    pub name: String,
    pub fullname: String,
}

impl Comment {
    /// 从 `{"kind": "t1", "data": {...}}` 的 `data` 部分解析
    pub fn from_json(data: &Value) -> Option<Self> {
        let id = data["id"].as_str()?.to_string();
        let fullname = data["name"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("t1_{}", id));

        // 已删除账号: author 为 "[deleted]" 且没有 author_fullname
        let author = match data["author"].as_str() {
            Some(name) if name != "[deleted]" => Some(Author {
                name: name.to_string(),
                id: data["author_fullname"].as_str().map(str::to_string),
            }),
            _ => None,
        };

        let created = data["created_utc"]
            .as_f64()
            .and_then(|ts| DateTime::from_timestamp(ts as i64, 0));

        Some(Self {
            id,
            fullname,
            link_id: data["link_id"].as_str().unwrap_or_default().to_string(),
            parent_id: data["parent_id"].as_str().unwrap_or_default().to_string(),
            author,
            body: data["body"].as_str().unwrap_or_default().to_string(),
            depth: data["depth"].as_u64().unwrap_or(0) as u32,
            created,
            // replies 没有子评论时是空字符串 ""
            replies: Thing::parse_listing(&data["replies"]),
        })
    }

    pub fn is_by(&self, account: &Account) -> bool {
        self.author
            .as_ref()
            .and_then(|a| a.id.as_deref())
            .map_or(false, |id| id == account.fullname())
    }
}

impl MoreComments {
    pub fn from_json(data: &Value) -> Self {
        let children = data["children"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|c| c.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        Self {
            parent_id: data["parent_id"].as_str().unwrap_or_default().to_string(),
            children,
            count: data["count"].as_u64().unwrap_or(0),
        }
    }

    pub fn is_continue_thread(&self) -> bool {
        self.children.is_empty()
    }
}

impl Thing {
    pub fn from_json(item: &Value) -> Option<Self> {
        match item["kind"].as_str()? {
            "t1" => Comment::from_json(&item["data"]).map(Thing::Comment),
            "more" => Some(Thing::More(MoreComments::from_json(&item["data"]))),
            _ => None,
        }
    }

    /// 解析 `{"kind": "Listing", "data": {"children": [...]}}`
    pub fn parse_listing(listing: &Value) -> Vec<Thing> {
        listing["data"]["children"]
            .as_array()
            .map(|children| children.iter().filter_map(Thing::from_json).collect())
            .unwrap_or_default()
    }

    pub fn parent_id(&self) -> &str {
        match self {
            Thing::Comment(c) => &c.parent_id,
            Thing::More(m) => &m.parent_id,
        }
    }
}

impl Submission {
    pub fn from_json(data: &Value) -> Option<Self> {
        let id = data["id"].as_str()?.to_string();
        Some(Self {
            fullname: data["name"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("t3_{}", id)),
            title: data["title"].as_str().unwrap_or_default().to_string(),
            id,
        })
    }
}

/// `t3_abc` -> `abc`
pub fn strip_kind(fullname: &str) -> &str {
    fullname.split_once('_').map_or(fullname, |(_, id)| id)
}
