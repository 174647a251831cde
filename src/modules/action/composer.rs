use crate::modules::perception::fund::InstrumentRecord;
use crate::modules::perception::scanner::COMMAND_TOKEN;

pub const FEEDBACK_URL: &str = "https://www.reddit.com/message/compose/?to=SebRut&subject=WertpapierBot";

/// 单个基金的回复块
pub fn render_record(record: &InstrumentRecord) -> String {
    format!(
        "**{name}**\n\
         \n\
         |||\n\
         ---|----\n\
         ISIN | {isin}\n\
         WKN | {wkn}\n\
         Fondswährung | {currency}\n\
         Ausschüttend | {distributing}\n\
         TER inklusive Performance Fee | {ter}\n\
         Fondsdomizil | {domicile}\n\
         Replikationsmethode | {replication}\n\
         \n\
         > {desc}\n\
         \n\
         [etfinfo.com]({source}) | [justETF]({comparison})\n\
         \n\
         ***\n",
        name = record.name,
        isin = record.isin,
        wkn = record.wkn,
        currency = record.currency,
        distributing = record.distributing,
        ter = record.ter,
        domicile = record.domicile,
        replication = record.replication,
        desc = quote(&record.description),
        source = record.source_url,
        comparison = record.comparison_url,
    )
}

pub fn disclaimer() -> String {
    format!(
        "\n^(Ich bin ein Bot. Aufruf mit `{}<WKN oder ISIN>` am Zeilenanfang, eine Kennung pro Zeile. Alle Angaben ohne Gewähr.)\n\
         \n\
         ^(wertpapierbot v{} | [Feedback]({}))\n",
        COMMAND_TOKEN,
        env!("CARGO_PKG_VERSION"),
        FEEDBACK_URL,
    )
}

/// 按抓取顺序拼接回复。没有任何记录时返回 None，绝不单独发送免责声明。
pub fn compose_reply(records: &[InstrumentRecord]) -> Option<String> {
    if records.is_empty() {
        return None;
    }
    let mut message: String = records.iter().map(render_record).collect();
    message.push_str(&disclaimer());
    Some(message)
}

// 多段描述每行都要加引用符号
fn quote(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n> ")
}
