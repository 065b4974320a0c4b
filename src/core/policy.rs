//! 重试策略：最大尝试次数与不可重试的失败类别

use std::collections::HashSet;

use serde::Serialize;

use crate::core::FailureCategory;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 每次运行的配置值；max_attempts 至少为 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    max_attempts: u32,
    non_retryable: HashSet<FailureCategory>,
    reject_empty_results: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// 默认仅 ConnectionOrAuth 不可重试
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            non_retryable: HashSet::from([FailureCategory::ConnectionOrAuth]),
            reject_empty_results: false,
        }
    }

    /// 替换不可重试类别集合
    pub fn with_non_retryable(mut self, categories: impl IntoIterator<Item = FailureCategory>) -> Self {
        self.non_retryable = categories.into_iter().collect();
        self
    }

    /// 空结果集视为可重试失败
    pub fn with_reject_empty_results(mut self, reject: bool) -> Self {
        self.reject_empty_results = reject;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_retryable(&self, category: FailureCategory) -> bool {
        !self.non_retryable.contains(&category)
    }

    pub fn rejects_empty_results(&self) -> bool {
        self.reject_empty_results
    }

    /// 已执行 attempts 次后是否还有预算
    pub fn has_budget(&self, attempts: usize) -> bool {
        attempts < self.max_attempts as usize
    }
}
