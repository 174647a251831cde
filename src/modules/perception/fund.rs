// 文件名: fund.rs
//
// etfinfo.com 基金资料抓取。页面有两种布局，通用信息表可能是第 2 张或第 1 张表，
// 详情表固定为第 3 张。

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const DATA_URL: &str = "https://www.etfinfo.com/de/product/";
pub const COMPARISON_URL: &str = "https://www.justetf.com/de/etf-profile.html";

const NOT_FOUND_PHRASE: &str = "Keine Fonds gefunden";
const LOCALE_COOKIES: &str =
    "DisplayUniverse=DE-priv; PreferredLanguage=de; PrivacyPolicy=true; DisclaimerAccepted=true";

const PRODUCT_COLUMN: &str = "#product > div.grid-b.float-left";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentRecord {
    pub name: String,
    pub isin: String,
    pub wkn: String,
    pub currency: String,
    pub distributing: String,
    pub ter: String,
    pub domicile: String,
    pub replication: String,
    pub description: String,
    pub source_url: String,
    pub comparison_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Isin,
    Wkn,
    Description,
    Currency,
    Distributing,
    Ter,
    Domicile,
    Replication,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Name => "name",
            Self::Isin => "isin",
            Self::Wkn => "wkn",
            Self::Description => "description",
            Self::Currency => "currency",
            Self::Distributing => "distributing",
            Self::Ter => "ter",
            Self::Domicile => "domicile",
            Self::Replication => "replication",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} while fetching {url}")]
    Status { url: String, status: u16 },

    #[error("funds with identifier \"{identifier}\" not found")]
    NotFound { identifier: String },

    #[error("no general information found for {identifier}")]
    MissingGeneral { identifier: String },

    #[error("no details available for {identifier}")]
    MissingDetails { identifier: String },

    #[error("field `{field}` missing for {identifier}")]
    MissingField { identifier: String, field: Field },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// 基金资料来源。响应流程只依赖这个 trait，测试中可替换。
#[async_trait]
pub trait InstrumentSource: Send + Sync {
    async fn fetch(&self, identifier: &str) -> Result<InstrumentRecord, FetchError>;
}

#[derive(Clone, Copy)]
enum Block {
    General,
    Details,
}

/// 字段 -> (所在表, 行号, 单元格选择器)
struct RowRule {
    field: Field,
    block: Block,
    row: usize,
    cell: &'static str,
}

const ROW_RULES: &[RowRule] = &[
    RowRule { field: Field::Name, block: Block::General, row: 0, cell: "td.value-cell > a" },
    RowRule { field: Field::Isin, block: Block::General, row: 1, cell: "td.value-cell" },
    RowRule { field: Field::Wkn, block: Block::General, row: 2, cell: "td.value-cell" },
    RowRule { field: Field::Currency, block: Block::Details, row: 2, cell: "td.value-cell" },
    RowRule { field: Field::Distributing, block: Block::Details, row: 4, cell: "td.value-cell" },
    RowRule { field: Field::Ter, block: Block::Details, row: 10, cell: "td.value-cell" },
    RowRule { field: Field::Domicile, block: Block::Details, row: 13, cell: "td.value-cell" },
    RowRule { field: Field::Replication, block: Block::Details, row: 14, cell: "td.value-cell" },
];

pub struct FundFetcher {
    client: Client,
    base_url: String,
}

impl FundFetcher {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DATA_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    pub fn product_url(&self, identifier: &str) -> String {
        // 标识符只含 [A-Z0-9]，无需转义
        format!("{}{}", self.base_url, identifier)
    }
}

#[async_trait]
impl InstrumentSource for FundFetcher {
    async fn fetch(&self, identifier: &str) -> Result<InstrumentRecord, FetchError> {
        let url = self.product_url(identifier);

        let resp = self.client.get(&url)
            .header(header::ACCEPT_LANGUAGE, "de-DE")
            .header(header::COOKIE, LOCALE_COOKIES)
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            return Err(FetchError::Status { url, status: resp.status().as_u16() });
        }

        let html = resp.text().await?;
        if html.contains(NOT_FOUND_PHRASE) {
            return Err(FetchError::NotFound { identifier: identifier.to_string() });
        }

        parse_product_page(identifier, &html, &url)
    }
}

/// 解析产品页。`Html` 不是 Send，因此解析保持同步，不跨 await。
pub fn parse_product_page(identifier: &str, html: &str, source_url: &str) -> Result<InstrumentRecord, FetchError> {
    let document = Html::parse_document(html);

    let general = select_rows(&document, 2);
    let general = if general.is_empty() { select_rows(&document, 1) } else { general };
    if general.is_empty() {
        warn!(identifier, "No general information found");
        return Err(FetchError::MissingGeneral { identifier: identifier.to_string() });
    }

    let description = select_text(&document, &format!("{} > p:nth-of-type(1)", PRODUCT_COLUMN))
        .ok_or_else(|| missing(identifier, Field::Description))?;

    let details = select_rows(&document, 3);
    if details.is_empty() {
        warn!(identifier, "No details available");
        return Err(FetchError::MissingDetails { identifier: identifier.to_string() });
    }

    let value = |field: Field| -> Result<String, FetchError> {
        let rule = ROW_RULES
            .iter()
            .find(|r| r.field == field)
            .ok_or_else(|| missing(identifier, field))?;
        let rows = match rule.block {
            Block::General => &general,
            Block::Details => &details,
        };
        let text = rows
            .get(rule.row)
            .and_then(|row| cell_text(row, rule.cell))
            .ok_or_else(|| missing(identifier, field))?;
        debug!(identifier, %field, value = %text, "Extracted field");
        Ok(text)
    };

    let isin = value(Field::Isin)?;
    let comparison_url = Url::parse_with_params(COMPARISON_URL, &[("isin", isin.as_str())])?.to_string();

    Ok(InstrumentRecord {
        name: value(Field::Name)?,
        wkn: value(Field::Wkn)?,
        currency: value(Field::Currency)?,
        distributing: value(Field::Distributing)?,
        ter: value(Field::Ter)?,
        domicile: value(Field::Domicile)?,
        replication: value(Field::Replication)?,
        isin,
        description,
        source_url: source_url.to_string(),
        comparison_url,
    })
}

fn missing(identifier: &str, field: Field) -> FetchError {
    FetchError::MissingField { identifier: identifier.to_string(), field }
}

/// 第 n 张表的直接行。html5ever 总会补上 tbody；单元格里嵌套的表不计入。
fn select_rows(document: &Html, nth: usize) -> Vec<ElementRef<'_>> {
    let css = format!("{} > table:nth-of-type({}) > tbody > tr", PRODUCT_COLUMN, nth);
    let Ok(selector) = Selector::parse(&css) else {
        return Vec::new();
    };
    document.select(&selector).collect()
}

fn select_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next().map(element_text)
}

fn cell_text(row: &ElementRef<'_>, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    row.select(&selector).next().map(element_text)
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
