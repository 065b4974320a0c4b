//! 错误类型与终止原因
//!
//! - AgentCallError：智能体调用失败，对当前运行总是致命的（核心不重试）
//! - IntrospectionError：循环开始前的 Schema 内省失败，不进入尝试历史
//! - AbortReason：运行以 NonRetryableFailure 结束时携带的原因

use serde::Serialize;
use thiserror::Error;

use crate::core::{ExecutionFailure, Repair};
use crate::llm::LlmError;

/// 智能体调用失败（超时、限流、输出格式错误、传输错误）
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AgentCallError {
    #[error("agent call timed out")]
    Timeout,

    #[error("agent call rate limited")]
    RateLimited,

    #[error("malformed agent output: {0}")]
    MalformedOutput(String),

    #[error("agent transport error: {0}")]
    Transport(String),

    #[error("agent call cancelled")]
    Cancelled,
}

impl From<LlmError> for AgentCallError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout => AgentCallError::Timeout,
            LlmError::RateLimited { .. } => AgentCallError::RateLimited,
            LlmError::EmptyResponse => AgentCallError::MalformedOutput(e.to_string()),
            LlmError::Network(msg) | LlmError::Api(msg) => AgentCallError::Transport(msg),
        }
    }
}

/// Schema 内省失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntrospectionError {
    #[error("schema introspection query failed: {0}")]
    Query(String),

    #[error("schema introspection lost the connection: {0}")]
    Connection(String),
}

/// 运行被终止的原因
///
/// 修复阶段的终止没有后续 Attempt 可承载诊断，Repair 随原因一起返回
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    #[error("generation failed: {error}")]
    GenerationFailed { error: AgentCallError },

    #[error("non-retryable execution failure: {failure}")]
    NonRetryableExecution { failure: ExecutionFailure },

    #[error("diagnosis failed: {error}")]
    DiagnosisFailed { error: AgentCallError },

    #[error("the question is not a request for SQL")]
    NotSqlQuestion { diagnosis: String },

    #[error("fix failed: {error}")]
    FixFailed { error: AgentCallError, repair: Repair },

    #[error("fix agent returned an empty statement")]
    EmptyFix { repair: Repair },

    #[error("fix agent returned the failed statement unchanged")]
    StuckFix { sql: String, repair: Repair },

    #[error("run cancelled")]
    Cancelled,
}

impl AbortReason {
    /// 终止前已得到、但未能用于新 Attempt 的诊断
    pub fn repair(&self) -> Option<&Repair> {
        match self {
            AbortReason::FixFailed { repair, .. }
            | AbortReason::EmptyFix { repair }
            | AbortReason::StuckFix { repair, .. } => Some(repair),
            _ => None,
        }
    }
}
