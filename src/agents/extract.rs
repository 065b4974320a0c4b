//! 从 LLM 自由文本中提取 SQL 与诊断
//!
//! 模型常常在 SQL 外包一层 ```sql 代码块、前缀 sql 标签或追加 "### End" 之类的收尾标记，
//! extract_sql 去掉这些包装并把空白压成单个空格。

use std::sync::OnceLock;

use regex::Regex;

use crate::agents::Diagnosis;

/// 推理智能体判定问题与 SQL 无关时输出的哨兵文本
pub const NOT_SQL_SENTINEL: &str = "NOT ASKING FOR SQL";

/// 收尾标记：出现即截断其后的内容（按顺序匹配，长标记在前）
const COMPLETION_MARKERS: &[&str] = &["### Completed:", "### End", "# Completed", "Completed:", "###"];

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:[A-Za-z0-9_-]*[ \t]*\n)?(.*?)```").expect("static regex")
    })
}

fn sql_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^sql(?:\s*:|\s+)").expect("static regex"))
}

/// 提取 SQL：优先取第一个代码块内容，去掉开头的 sql 标签与收尾标记，压缩空白
pub fn extract_sql(text: &str) -> String {
    let body = match fence_regex().captures(text) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
        None => text,
    };
    let mut sql = body.trim();
    if let Some(tag) = sql_tag_regex().find(sql) {
        sql = sql[tag.end()..].trim_start();
    }
    for marker in COMPLETION_MARKERS {
        if let Some(pos) = sql.find(marker) {
            sql = sql[..pos].trim_end();
        }
    }
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn section_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)DIAGNOSIS\s*:\s*(.*?)\s*(?:^|\n)\s*FIX\s*:\s*(.*)").expect("static regex")
    })
}

/// 解析推理智能体输出
///
/// 有 DIAGNOSIS: / FIX: 两段时分别取用；否则整段文本既是诊断也是修复指令。
pub fn parse_diagnosis(text: &str) -> Diagnosis {
    let trimmed = text.trim();
    let (diagnosis, fix_instruction) = match section_regex().captures(trimmed) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default(),
            caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default(),
        ),
        None => (trimmed, trimmed),
    };
    Diagnosis {
        diagnosis: diagnosis.to_string(),
        fix_instruction: fix_instruction.to_string(),
        not_sql_request: trimmed.contains(NOT_SQL_SENTINEL),
    }
}

/// 截断过长的错误消息（按字符）
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
