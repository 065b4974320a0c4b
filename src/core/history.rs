//! 尝试历史：每次执行一条 Attempt，只追加、不修改
//!
//! Attempt 在执行后一次性构建；产生该次 SQL 的诊断与修复指令（Repair）随之写入，
//! 因此首个 Attempt 的 repair 为 None，后续 Attempt 记录「它是如何被修出来的」。

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::ExecutionFailure;

/// 错误推理智能体给出的诊断与修复指令
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repair {
    pub diagnosis: String,
    pub fix_instruction: String,
}

/// 单次执行结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptResult {
    Success { row_count: usize },
    Failure { failure: ExecutionFailure },
}

/// 一次「生成/修复 -> 执行」循环
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    /// 从 1 开始，单调递增
    pub sequence: u32,
    pub sql: String,
    pub result: AttemptResult,
    pub repair: Option<Repair>,
    pub executed_at: DateTime<Utc>,
}

impl Attempt {
    pub fn failure(&self) -> Option<&ExecutionFailure> {
        match &self.result {
            AttemptResult::Failure { failure } => Some(failure),
            AttemptResult::Success { .. } => None,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.result, AttemptResult::Success { .. })
    }

    /// 产生本次 SQL 的诊断文本
    pub fn diagnosis(&self) -> Option<&str> {
        self.repair.as_ref().map(|r| r.diagnosis.as_str())
    }
}

/// 有序、只追加的尝试序列
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AttemptHistory {
    attempts: Vec<Attempt>,
}

impl AttemptHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条记录；序号由历史长度决定，返回新 Attempt 的引用
    pub fn record(
        &mut self,
        sql: impl Into<String>,
        result: AttemptResult,
        repair: Option<Repair>,
    ) -> &Attempt {
        let sequence = self.attempts.len() as u32 + 1;
        self.attempts.push(Attempt {
            sequence,
            sql: sql.into(),
            result,
            repair,
            executed_at: Utc::now(),
        });
        &self.attempts[self.attempts.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn last(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    pub fn get(&self, index: usize) -> Option<&Attempt> {
        self.attempts.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attempt> {
        self.attempts.iter()
    }
}

impl<'a> IntoIterator for &'a AttemptHistory {
    type Item = &'a Attempt;
    type IntoIter = std::slice::Iter<'a, Attempt>;

    fn into_iter(self) -> Self::IntoIter {
        self.attempts.iter()
    }
}
