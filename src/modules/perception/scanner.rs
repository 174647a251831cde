use regex::Regex;
use std::sync::LazyLock;

/// 触发指令，必须位于行首
pub const COMMAND_TOKEN: &str = "!FUND: ";

// (?m): 每行独立匹配；(?R): 容忍 \r\n 换行
static WKN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mR)^!FUND: ([A-Z0-9]{6})$").expect("valid WKN pattern"));
static ISIN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mR)^!FUND: ([A-Z]{2}[0-9]{10})$").expect("valid ISIN pattern"));

/// 一条评论中提取出的标识符，WKN 在前，ISIN 在后，各自保持出现顺序。
pub type MatchSet = Vec<String>;

pub fn scan(body: &str) -> MatchSet {
    let wkns = WKN_PATTERN.captures_iter(body).map(|c| c[1].to_string());
    let isins = ISIN_PATTERN.captures_iter(body).map(|c| c[1].to_string());
    wkns.chain(isins).collect()
}
