//! 失败分类：将执行器的原始失败映射为类别
//!
//! 分类集中在编排器一侧，便于独立测试；规则是确定性的，同一条消息总是得到同一类别。
//! 类别只影响「是否可重试」的判断，不影响智能体的 Prompt。

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::QueryFailure;

/// 执行失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Syntax,
    /// 未知列 / 表 / 函数等
    SemanticMismatch,
    /// 类型不匹配、约束冲突、除零等
    ConstraintOrType,
    /// 连接被拒、认证失败；默认不可重试
    ConnectionOrAuth,
    /// 无法识别；默认可重试
    Unknown,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureCategory::Syntax => "syntax",
            FailureCategory::SemanticMismatch => "semantic_mismatch",
            FailureCategory::ConstraintOrType => "constraint_or_type",
            FailureCategory::ConnectionOrAuth => "connection_or_auth",
            FailureCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// 已分类的执行失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub category: FailureCategory,
    pub message: String,
    /// 从错误消息中提取的出错片段（如未知列名），无法提取时为 None
    pub fragment: Option<String>,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

// 规则按顺序匹配：连接层优先，再语义、约束/类型，最后语法。
// "invalid input syntax for type integer" 这类消息含 syntax 字样但属于类型错误，故约束/类型在语法之前。
const CONNECTION_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "could not connect",
    "unable to open database",
    "access denied",
    "authentication failed",
    "password authentication",
    "permission denied",
    "not connected",
    "pool timed out",
    "broken pipe",
    "timed out",
];

const SEMANTIC_PATTERNS: &[&str] = &[
    "no such column",
    "no such table",
    "no such function",
    "unknown column",
    "unknown table",
    "does not exist",
    "ambiguous column",
    "invalid column name",
    "invalid object name",
    "undefined column",
    "undefined table",
    "misuse of aggregate",
];

const CONSTRAINT_OR_TYPE_PATTERNS: &[&str] = &[
    "datatype mismatch",
    "type mismatch",
    "invalid input syntax for type",
    "cannot cast",
    "conversion failed",
    "division by zero",
    "divide by zero",
    "constraint failed",
    "violates",
    "out of range",
    "overflow",
];

const SYNTAX_PATTERNS: &[&str] = &[
    "syntax error",
    "incorrect syntax",
    "incomplete input",
    "unrecognized token",
    "parse error",
    "you have an error in your sql syntax",
];

/// 失败分类器：无状态，纯函数
#[derive(Debug, Default, Clone, Copy)]
pub struct FailureClassifier;

impl FailureClassifier {
    pub fn new() -> Self {
        Self
    }

    /// 连接层失败总是 ConnectionOrAuth；其余按消息规则匹配
    pub fn category_of(&self, failure: &QueryFailure) -> FailureCategory {
        if failure.connection_level {
            return FailureCategory::ConnectionOrAuth;
        }
        let lower = failure.message.to_lowercase();
        let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));
        if matches(CONNECTION_PATTERNS) {
            FailureCategory::ConnectionOrAuth
        } else if matches(SEMANTIC_PATTERNS) {
            FailureCategory::SemanticMismatch
        } else if matches(CONSTRAINT_OR_TYPE_PATTERNS) {
            FailureCategory::ConstraintOrType
        } else if matches(SYNTAX_PATTERNS) {
            FailureCategory::Syntax
        } else {
            FailureCategory::Unknown
        }
    }

    pub fn classify(&self, failure: &QueryFailure) -> ExecutionFailure {
        ExecutionFailure {
            category: self.category_of(failure),
            message: failure.message.clone(),
            fragment: extract_fragment(&failure.message),
        }
    }
}

fn fragment_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // SQLite: no such column: regn / no such table: sales
            r"(?i)no such (?:column|table|function):\s*([^\s,;]+)",
            // SQLite: near "FROM": syntax error
            r#"(?i)near\s+"([^"]+)""#,
            // PostgreSQL: column "regn" does not exist
            r#"(?i)(?:column|relation|table)\s+"([^"]+)"\s+does not exist"#,
            // MySQL: Unknown column 'regn' in 'field list'
            r"(?i)unknown (?:column|table)\s+'([^']+)'",
            // SQL Server: Invalid column name 'regn'.
            r"(?i)invalid (?:column|object) name\s+'([^']+)'",
            // 通用：unknown column regn
            r"(?i)unknown (?:column|table)\s+([A-Za-z_][\w.]*)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// 从错误消息中提取出错片段
pub fn extract_fragment(message: &str) -> Option<String> {
    fragment_patterns().iter().find_map(|re| {
        re.captures(message)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}
