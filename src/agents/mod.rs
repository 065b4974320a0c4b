//! 智能体层：SQL 生成、错误推理、错误修复
//!
//! - traits：能力接口与请求 / 响应记录
//! - llm：基于 LlmClient 的实现
//! - extract：从模型输出中提取 SQL / 诊断
//! - prompts：Prompt 模板加载

pub mod extract;
pub mod llm;
pub mod prompts;
pub mod traits;

use std::sync::Arc;

pub use extract::{extract_sql, parse_diagnosis, NOT_SQL_SENTINEL};
pub use llm::{LlmErrorFixer, LlmErrorReasoner, LlmSqlGenerator};
pub use prompts::PromptSet;
pub use traits::{
    Diagnosis, DiagnosisRequest, ErrorFixer, ErrorReasoner, FixRequest, FixedSql, GeneratedSql,
    GenerationRequest, SqlGenerator,
};

use crate::llm::LlmClient;

/// 三个智能体的组合
#[derive(Clone)]
pub struct Agents {
    pub generator: Arc<dyn SqlGenerator>,
    pub reasoner: Arc<dyn ErrorReasoner>,
    pub fixer: Arc<dyn ErrorFixer>,
}

impl Agents {
    /// 用三个（可相同的）LLM 客户端与模板组装
    pub fn from_llms(
        generator_llm: Arc<dyn LlmClient>,
        reasoner_llm: Arc<dyn LlmClient>,
        fixer_llm: Arc<dyn LlmClient>,
        prompts: &PromptSet,
        dialect: &str,
    ) -> Self {
        Self {
            generator: Arc::new(LlmSqlGenerator::new(
                generator_llm,
                prompts.sql_generator.clone(),
            )),
            reasoner: Arc::new(LlmErrorReasoner::new(
                reasoner_llm,
                prompts.error_reasoning.clone(),
            )),
            fixer: Arc::new(LlmErrorFixer::new(
                fixer_llm,
                prompts.error_fix.clone(),
                dialect,
            )),
        }
    }
}
