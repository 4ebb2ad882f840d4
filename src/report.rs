//! # 结果输出格式
//!
//! 批次结果与分页查询结果的 JSON / CSV / TXT 渲染

use serde::Serialize;
use serde_json::json;
use std::fmt::Write as _;

use crate::error::Result;
use crate::tester::{BatchReport, ClassifiedResult, ResultsPage};

const CSV_HEADER: &str = "key_masked,status,provider,model,error,is_rate_limit,is_paid,tested_at";

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    /// 每行一个密钥
    Txt,
}

/// 渲染批次结果
///
/// TXT 输出原文密钥，仅用于批次结束后的即时展示。
pub fn render_batch(report: &BatchReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let body = json!({
                "success": true,
                "test_id": report.test_id,
                "total": report.total,
                "results": report.counts,
                "items": report.items,
            });
            Ok(serde_json::to_string_pretty(&body)?)
        }
        OutputFormat::Csv => Ok(render_csv(report.items.iter().map(|i| &i.result))),
        OutputFormat::Txt => Ok(render_lines(report.items.iter().map(|i| i.key.as_str()))),
    }
}

/// 渲染分页查询结果，只包含脱敏密钥
pub fn render_results(page: &ResultsPage, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let session = &page.session;
            let body = json!({
                "total": session.total_keys,
                "page": page.page,
                "page_size": page.page_size,
                "returned": page.items.len(),
                "session": {
                    "provider": session.provider,
                    "model": session.model,
                    "status": session.status,
                    "created_at": session.created_at,
                    "completed_at": session.completed_at,
                },
                "summary": session.counts,
                "items": page.items.iter().map(public_item).collect::<Vec<_>>(),
            });
            Ok(serde_json::to_string_pretty(&body)?)
        }
        OutputFormat::Csv => Ok(render_csv(page.items.iter())),
        OutputFormat::Txt => Ok(render_lines(page.items.iter().map(|r| r.key_masked.as_str()))),
    }
}

fn public_item(result: &ClassifiedResult) -> serde_json::Value {
    json!({
        "key_masked": result.key_masked,
        "status": result.status,
        "provider": result.provider,
        "model": result.model,
        "error": result.error,
        "is_rate_limit": result.is_rate_limit,
        "is_paid": result.is_paid,
        "tested_at": result.tested_at,
    })
}

fn render_csv<'a>(results: impl Iterator<Item = &'a ClassifiedResult>) -> String {
    let mut results = results.peekable();
    if results.peek().is_none() {
        return String::new();
    }

    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for result in results {
        let is_paid = result
            .is_paid
            .map_or(String::new(), |paid| paid.to_string());
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{}",
            escape_csv_field(&result.key_masked),
            result.status,
            result.provider,
            escape_csv_field(&result.model),
            escape_csv_field(result.error.as_deref().unwrap_or_default()),
            result.is_rate_limit,
            is_paid,
            result.tested_at.to_rfc3339(),
        );
    }
    csv
}

fn render_lines<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// 含逗号、引号或换行时加引号并转义内部引号
fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
