use anyhow::{bail, Result};
use config::{Config, ConfigBuilder, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;
use std::env;
use std::path::Path;

pub const CONFIG_PATH_VAR: &str = "WERTPAPIERBOT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "bot_config.toml";
pub const ENV_PREFIX: &str = "WERTPAPIERBOT";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// 轮询最新帖子及其全部评论
    Poll,
    /// 订阅版块评论流
    Stream,
}

#[derive(Deserialize, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

// 不打印密钥
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub subreddit: String,
    pub mode: WatchMode,
    pub interval_sec: u64,
    pub submission_limit: u32,
    pub stream_poll_sec: u64,
    pub production: bool,
    pub log_file: String,
    pub credentials: Credentials,
}

impl BotConfig {
    /// 配置文件存在时只读文件，否则只读 `WERTPAPIERBOT_*` 环境变量。
    pub fn load() -> Result<Self> {
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::resolve(Path::new(&path), Self::environment())
    }

    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
    }

    pub fn resolve(path: &Path, environment: Environment) -> Result<Self> {
        let builder = Self::defaults()?;
        let builder = if path.is_file() {
            builder.add_source(File::from(path))
        } else {
            builder.add_source(environment)
        };

        let settings = builder.build()?;
        let config: BotConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("subreddit", "finanzen")?
            .set_default("mode", "stream")?
            .set_default("interval_sec", 60)?
            .set_default("submission_limit", 25)?
            .set_default("stream_poll_sec", 5)?
            .set_default("production", false)?
            .set_default("log_file", "wertpapierbot.log")?)
    }

    fn validate(&self) -> Result<()> {
        let c = &self.credentials;
        for (name, value) in [
            ("client_id", &c.client_id),
            ("client_secret", &c.client_secret),
            ("username", &c.username),
            ("password", &c.password),
        ] {
            if value.trim().is_empty() {
                bail!("Missing Reddit credential `{}`", name);
            }
        }
        if self.subreddit.trim().is_empty() {
            bail!("Target subreddit must not be empty");
        }
        if self.submission_limit == 0 {
            bail!("submission_limit must be at least 1");
        }
        Ok(())
    }
}
