//! Prompt 模板：从 config/prompts/ 读取，文件缺失时回退到内置模板
//!
//! 占位符：{dialect} {schema} {question} {sql} {error} {instruction}

use std::path::Path;

pub const SQL_GENERATOR_FILE: &str = "sql_generator.txt";
pub const ERROR_REASONING_FILE: &str = "error_reasoning.txt";
pub const ERROR_FIX_FILE: &str = "error_fix.txt";

const DEFAULT_SQL_GENERATOR: &str = "You are a text-to-SQL agent. You generate one {dialect} SQL query that answers the user's question.

Database information:
{schema}

Refer to table and column names exactly as they appear above.
ONLY ANSWER WITH SQL.

Question: {question}";

const DEFAULT_ERROR_REASONING: &str = "Given a SQL error message, the failed SQL, the user question and the database information, write concise instructions for another agent on how to resolve the issue.

If the user question is not a request for data from this database, answer with exactly: SELECT \"NOT ASKING FOR SQL\";

Otherwise answer in two sections:
DIAGNOSIS: the error type and its root cause (e.g. the column `regn` does not exist in `timber_sales`)
FIX: the steps to correct the query (e.g. use `salesperson.region` and join on `salesperson_id`)

Database ({dialect}):
{schema}

Question: {question}
Failed SQL: {sql}
Error: {error}";

const DEFAULT_ERROR_FIX: &str = "You are a {dialect} SQL expert. Apply the instructions below to the failed query and output the corrected query.

Failed SQL: {sql}

Instructions:
{instruction}

Preserve the original query logic and apply only the described fix.
ONLY output the corrected SQL query, without explanations or comments.";

/// 三个智能体的 Prompt 模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub sql_generator: String,
    pub error_reasoning: String,
    pub error_fix: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            sql_generator: DEFAULT_SQL_GENERATOR.to_string(),
            error_reasoning: DEFAULT_ERROR_REASONING.to_string(),
            error_fix: DEFAULT_ERROR_FIX.to_string(),
        }
    }
}

impl PromptSet {
    /// 从目录加载；单个文件缺失或为空时使用内置模板
    pub fn load(dir: &Path) -> Self {
        let defaults = Self::default();
        Self {
            sql_generator: read_or(dir, SQL_GENERATOR_FILE, defaults.sql_generator),
            error_reasoning: read_or(dir, ERROR_REASONING_FILE, defaults.error_reasoning),
            error_fix: read_or(dir, ERROR_FIX_FILE, defaults.error_fix),
        }
    }
}

fn read_or(dir: &Path, file: &str, fallback: String) -> String {
    let path = dir.join(file);
    match std::fs::read_to_string(&path) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "prompt file is empty, using built-in template");
            fallback
        }
        Err(_) => {
            tracing::debug!(path = %path.display(), "prompt file not found, using built-in template");
            fallback
        }
    }
}

/// 用 (名称, 值) 替换模板中的 {名称}
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_occurrences() {
        let out = render("{a} and {b}, again {a}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and y, again x");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("{missing}", &[("a", "x")]), "{missing}");
    }

    #[test]
    fn test_load_falls_back_per_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SQL_GENERATOR_FILE), "custom {question}").unwrap();
        std::fs::write(dir.path().join(ERROR_FIX_FILE), "  \n").unwrap();

        let prompts = PromptSet::load(dir.path());
        assert_eq!(prompts.sql_generator, "custom {question}");
        assert_eq!(prompts.error_reasoning, DEFAULT_ERROR_REASONING);
        assert_eq!(prompts.error_fix, DEFAULT_ERROR_FIX);
    }

    #[test]
    fn test_builtin_templates_carry_placeholders() {
        let p = PromptSet::default();
        assert!(p.sql_generator.contains("{question}") && p.sql_generator.contains("{schema}"));
        assert!(p.error_reasoning.contains("{error}") && p.error_reasoning.contains("NOT ASKING FOR SQL"));
        assert!(p.error_fix.contains("{instruction}"));
    }
}
