//! 智能体能力接口：每个智能体只有一个操作，请求 / 响应都是类型化记录
//!
//! Prompt 文本是实现细节，不属于编排契约；编排器统一把三者视为「可能失败的函数」。

use async_trait::async_trait;

use crate::core::{AgentCallError, ExecutionFailure};
use crate::db::SchemaContext;

/// SQL 生成请求
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub question: &'a str,
    pub schema: &'a SchemaContext,
}

/// 生成结果：一条候选 SQL 与理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSql {
    pub sql: String,
    pub rationale: String,
}

/// 错误推理请求
#[derive(Debug, Clone, Copy)]
pub struct DiagnosisRequest<'a> {
    pub sql: &'a str,
    pub failure: &'a ExecutionFailure,
    pub question: &'a str,
    pub schema: &'a SchemaContext,
}

/// 诊断：错误原因 + 给修复智能体的指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub diagnosis: String,
    pub fix_instruction: String,
    /// 推理智能体判定用户问题与 SQL 无关
    pub not_sql_request: bool,
}

impl Diagnosis {
    pub fn new(diagnosis: impl Into<String>, fix_instruction: impl Into<String>) -> Self {
        Self {
            diagnosis: diagnosis.into(),
            fix_instruction: fix_instruction.into(),
            not_sql_request: false,
        }
    }
}

/// 修复请求
#[derive(Debug, Clone, Copy)]
pub struct FixRequest<'a> {
    pub sql: &'a str,
    pub fix_instruction: &'a str,
}

/// 修复后的 SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSql {
    pub sql: String,
}

#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<GeneratedSql, AgentCallError>;
}

#[async_trait]
pub trait ErrorReasoner: Send + Sync {
    async fn diagnose(&self, request: &DiagnosisRequest<'_>) -> Result<Diagnosis, AgentCallError>;
}

#[async_trait]
pub trait ErrorFixer: Send + Sync {
    async fn apply_fix(&self, request: &FixRequest<'_>) -> Result<FixedSql, AgentCallError>;
}
