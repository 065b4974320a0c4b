//! 基于 LlmClient 的三个智能体实现
//!
//! 每个智能体持有自己的 LLM（可用不同模型）与 Prompt 模板；瞬时错误的重试由 RetryingLlmClient 负责，
//! 这里只做一次调用，失败即转为 AgentCallError。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::extract::{extract_sql, parse_diagnosis, truncate_chars};
use crate::agents::prompts::render;
use crate::agents::{
    Diagnosis, DiagnosisRequest, ErrorFixer, ErrorReasoner, FixRequest, FixedSql, GeneratedSql,
    GenerationRequest, SqlGenerator,
};
use crate::core::AgentCallError;
use crate::llm::{LlmClient, Message};

/// 传给推理智能体的错误消息最大字符数
const MAX_ERROR_CHARS: usize = 500;

pub struct LlmSqlGenerator {
    llm: Arc<dyn LlmClient>,
    template: String,
}

impl LlmSqlGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, template: impl Into<String>) -> Self {
        Self {
            llm,
            template: template.into(),
        }
    }
}

#[async_trait]
impl SqlGenerator for LlmSqlGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<GeneratedSql, AgentCallError> {
        let prompt = render(
            &self.template,
            &[
                ("dialect", request.schema.dialect()),
                ("schema", request.schema.as_text()),
                ("question", request.question),
            ],
        );
        let raw = self.llm.complete(&[Message::user(prompt)]).await?;
        let sql = extract_sql(&raw);
        if sql.is_empty() {
            return Err(AgentCallError::MalformedOutput(format!(
                "no SQL found in generator output: {}",
                truncate_chars(raw.trim(), 200)
            )));
        }
        Ok(GeneratedSql {
            sql,
            rationale: raw.trim().to_string(),
        })
    }
}

pub struct LlmErrorReasoner {
    llm: Arc<dyn LlmClient>,
    template: String,
}

impl LlmErrorReasoner {
    pub fn new(llm: Arc<dyn LlmClient>, template: impl Into<String>) -> Self {
        Self {
            llm,
            template: template.into(),
        }
    }
}

#[async_trait]
impl ErrorReasoner for LlmErrorReasoner {
    async fn diagnose(&self, request: &DiagnosisRequest<'_>) -> Result<Diagnosis, AgentCallError> {
        let error = request.failure.to_string();
        let prompt = render(
            &self.template,
            &[
                ("dialect", request.schema.dialect()),
                ("schema", request.schema.as_text()),
                ("question", request.question),
                ("sql", request.sql),
                ("error", truncate_chars(&error, MAX_ERROR_CHARS)),
            ],
        );
        let raw = self.llm.complete(&[Message::user(prompt)]).await?;
        if raw.trim().is_empty() {
            return Err(AgentCallError::MalformedOutput(
                "empty reasoning output".to_string(),
            ));
        }
        Ok(parse_diagnosis(&raw))
    }
}

pub struct LlmErrorFixer {
    llm: Arc<dyn LlmClient>,
    template: String,
    /// 修复 Prompt 中的方言名
    dialect: String,
}

impl LlmErrorFixer {
    pub fn new(llm: Arc<dyn LlmClient>, template: impl Into<String>, dialect: impl Into<String>) -> Self {
        Self {
            llm,
            template: template.into(),
            dialect: dialect.into(),
        }
    }
}

#[async_trait]
impl ErrorFixer for LlmErrorFixer {
    async fn apply_fix(&self, request: &FixRequest<'_>) -> Result<FixedSql, AgentCallError> {
        let prompt = render(
            &self.template,
            &[
                ("dialect", self.dialect.as_str()),
                ("sql", request.sql),
                ("instruction", request.fix_instruction),
            ],
        );
        let raw = self.llm.complete(&[Message::user(prompt)]).await?;
        // 空语句交给编排器判定为 EmptyFix
        Ok(FixedSql {
            sql: extract_sql(&raw),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::prompts::PromptSet;
    use crate::core::{ExecutionFailure, FailureCategory};
    use crate::db::SchemaContext;
    use crate::llm::{LlmError, MockLlmClient};

    fn schema() -> SchemaContext {
        SchemaContext::from_text("SQLite", "salesperson(salesperson_id, name, region)")
    }

    #[tokio::test]
    async fn test_generator_renders_prompt_and_extracts_sql() {
        let llm = Arc::new(MockLlmClient::replies(["```sql\nSELECT name\nFROM salesperson\n```"]));
        let generator = LlmSqlGenerator::new(llm.clone(), PromptSet::default().sql_generator);
        let schema = schema();

        let out = generator
            .generate(&GenerationRequest {
                question: "list all salespeople",
                schema: &schema,
            })
            .await
            .unwrap();
        assert_eq!(out.sql, "SELECT name FROM salesperson");

        let sent = llm.received(0).unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content.contains("list all salespeople"));
        assert!(sent[0].content.contains("salesperson(salesperson_id, name, region)"));
        assert!(sent[0].content.contains("SQLite"));
    }

    #[tokio::test]
    async fn test_generator_maps_errors() {
        let llm = Arc::new(MockLlmClient::scripted(vec![
            Err(LlmError::Timeout),
            Ok("   ".to_string()),
        ]));
        let generator = LlmSqlGenerator::new(llm, "{question}");
        let schema = schema();
        let request = GenerationRequest {
            question: "q",
            schema: &schema,
        };
        assert_eq!(generator.generate(&request).await, Err(AgentCallError::Timeout));
        assert!(matches!(
            generator.generate(&request).await,
            Err(AgentCallError::MalformedOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_reasoner_parses_sections_and_truncates_error() {
        let llm = Arc::new(MockLlmClient::replies([
            "DIAGNOSIS: regn is not a column\nFIX: use region from salesperson",
        ]));
        let reasoner = LlmErrorReasoner::new(llm.clone(), "{error}");
        let schema = schema();
        let failure = ExecutionFailure {
            category: FailureCategory::SemanticMismatch,
            message: "x".repeat(2000),
            fragment: None,
        };

        let d = reasoner
            .diagnose(&DiagnosisRequest {
                sql: "SELECT regn FROM salesperson",
                failure: &failure,
                question: "q",
                schema: &schema,
            })
            .await
            .unwrap();
        assert_eq!(d.diagnosis, "regn is not a column");
        assert_eq!(d.fix_instruction, "use region from salesperson");

        let sent = llm.received(0).unwrap();
        assert_eq!(sent[0].content.chars().count(), MAX_ERROR_CHARS);
    }

    #[tokio::test]
    async fn test_fixer_returns_extracted_sql() {
        let llm = Arc::new(MockLlmClient::replies(["sql\nSELECT region FROM salesperson\n### End"]));
        let fixer = LlmErrorFixer::new(llm.clone(), PromptSet::default().error_fix, "SQLite");

        let fixed = fixer
            .apply_fix(&FixRequest {
                sql: "SELECT regn FROM salesperson",
                fix_instruction: "rename regn to region",
            })
            .await
            .unwrap();
        assert_eq!(fixed.sql, "SELECT region FROM salesperson");
        let sent = llm.received(0).unwrap();
        assert!(sent[0].content.contains("rename regn to region"));
        assert!(sent[0].content.contains("SELECT regn FROM salesperson"));
    }
}
