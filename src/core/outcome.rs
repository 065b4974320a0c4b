//! 运行的终态结果：每次运行恰好产生一个 Outcome，构建后不可变

use serde::Serialize;

use crate::core::{AbortReason, AttemptHistory, ExecutionFailure};
use crate::db::QueryRows;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded {
        final_sql: String,
        rows: QueryRows,
        history: AttemptHistory,
    },
    ExhaustedRetries {
        history: AttemptHistory,
        last_failure: ExecutionFailure,
    },
    NonRetryableFailure {
        history: AttemptHistory,
        reason: AbortReason,
    },
}

impl Outcome {
    pub fn history(&self) -> &AttemptHistory {
        match self {
            Outcome::Succeeded { history, .. }
            | Outcome::ExhaustedRetries { history, .. }
            | Outcome::NonRetryableFailure { history, .. } => history,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded { .. })
    }

    pub fn final_sql(&self) -> Option<&str> {
        match self {
            Outcome::Succeeded { final_sql, .. } => Some(final_sql),
            _ => None,
        }
    }

    pub fn rows(&self) -> Option<&QueryRows> {
        match self {
            Outcome::Succeeded { rows, .. } => Some(rows),
            _ => None,
        }
    }

    /// 终态的简短标签（日志与事件用）
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Succeeded { .. } => "succeeded",
            Outcome::ExhaustedRetries { .. } => "exhausted_retries",
            Outcome::NonRetryableFailure { .. } => "non_retryable_failure",
        }
    }

    /// 失败时给用户看的一句话说明
    pub fn failure_summary(&self) -> Option<String> {
        match self {
            Outcome::Succeeded { .. } => None,
            Outcome::ExhaustedRetries {
                history,
                last_failure,
            } => Some(format!(
                "gave up after {} attempts, last failure: {}",
                history.len(),
                last_failure
            )),
            Outcome::NonRetryableFailure { reason, .. } => Some(reason.to_string()),
        }
    }
}
