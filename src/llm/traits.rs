//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient::complete；
//! RetryingLlmClient 在传输层对超时、限流、网络错误做指数退避重试，编排核心本身不重试智能体调用。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::Message;

/// LLM 调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("LLM network error: {0}")]
    Network(String),

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl LlmError {
    /// 超时、限流、网络错误视为瞬时错误，可重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout | LlmError::RateLimited { .. } | LlmError::Network(_)
        )
    }
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;
}

/// 重试配置：最大重试次数（不含首次）与退避区间
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    /// 第 n 次重试前的等待时间（n 从 0 开始，指数增长并封顶）
    fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// 带瞬时错误重试的 LLM 包装
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let mut retry = 0;
        loop {
            match self.inner.complete(messages).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_transient() && retry < self.config.max_retries => {
                    let wait = match &e {
                        LlmError::RateLimited {
                            retry_after_ms: Some(ms),
                        } => Duration::from_millis(*ms).min(self.config.max_backoff),
                        _ => self.config.backoff_for(retry),
                    };
                    tracing::warn!(error = %e, retry = retry + 1, wait_ms = wait.as_millis() as u64, "LLM call failed, retrying");
                    tokio::time::sleep(wait).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
