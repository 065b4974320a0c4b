//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TEXT2SQL__*` 覆盖（双下划线表示嵌套，如 `TEXT2SQL__RETRY__MAX_ATTEMPTS=5`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::{FailureCategory, RetryPolicy};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub web: WebSection,
}

/// [app] 段：Prompt 目录
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    /// Prompt 模板目录，未设置时依次查找 config/prompts、../config/prompts
    pub prompts_dir: Option<PathBuf>,
}

/// [llm] 段：后端选择、各智能体模型、超时与传输层重试
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / mock；openai 需要 OPENAI_API_KEY
    #[serde(default = "default_provider")]
    pub provider: String,
    pub base_url: Option<String>,
    /// 读取 API Key 的环境变量名
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub models: LlmModelsSection,
    /// 单次 LLM 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// 超时 / 限流 / 网络错误时的最大重试次数（不含首次）
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            api_key_env: default_api_key_env(),
            models: LlmModelsSection::default(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_llm_max_retries(),
            initial_backoff_ms: default_llm_backoff_ms(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_llm_max_retries() -> u32 {
    2
}

fn default_llm_backoff_ms() -> u64 {
    500
}

/// [llm.models] 段：三个智能体可分别使用不同模型
#[derive(Debug, Clone, Deserialize)]
pub struct LlmModelsSection {
    #[serde(default = "default_sql_model")]
    pub sql_generator: String,
    #[serde(default = "default_reasoning_model")]
    pub error_reasoning: String,
    #[serde(default = "default_sql_model")]
    pub error_fix: String,
}

impl Default for LlmModelsSection {
    fn default() -> Self {
        Self {
            sql_generator: default_sql_model(),
            error_reasoning: default_reasoning_model(),
            error_fix: default_sql_model(),
        }
    }
}

fn default_sql_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_reasoning_model() -> String {
    "gpt-4o".to_string()
}

/// [database] 段：连接地址、连接池大小、Schema 摘要规模
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    /// sqlx 连接串，如 sqlite:data/sales.db?mode=rwc
    pub url: Option<String>,
    /// 未配置 url 时使用内置示例销售库
    #[serde(default = "default_use_sample")]
    pub use_sample: bool,
    /// 示例库是否包含 products 表
    #[serde(default)]
    pub sample_extended: bool,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 获取连接的超时（秒）
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    /// 每张表附带的样例行数
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
    /// Schema 摘要中最多展开的表数
    #[serde(default = "default_max_tables")]
    pub max_tables: usize,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: None,
            use_sample: default_use_sample(),
            sample_extended: false,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            sample_rows: default_sample_rows(),
            max_tables: default_max_tables(),
        }
    }
}

fn default_use_sample() -> bool {
    true
}

fn default_max_connections() -> u32 {
    4
}

fn default_acquire_timeout() -> u64 {
    10
}

fn default_sample_rows() -> usize {
    3
}

fn default_max_tables() -> usize {
    10
}

/// [retry] 段：自纠错循环的预算与不可重试类别
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 不可重试的失败类别，如 ["connection_or_auth"]
    #[serde(default = "default_non_retryable")]
    pub non_retryable: Vec<FailureCategory>,
    /// 空结果集是否视为失败（触发诊断与修复）
    #[serde(default)]
    pub reject_empty_results: bool,
    /// 单次运行超时（秒），0 表示不限
    #[serde(default)]
    pub run_timeout_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            non_retryable: default_non_retryable(),
            reject_empty_results: false,
            run_timeout_secs: 0,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_non_retryable() -> Vec<FailureCategory> {
    vec![FailureCategory::ConnectionOrAuth]
}

impl RetrySection {
    /// 转为核心使用的 RetryPolicy
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
            .with_non_retryable(self.non_retryable.iter().copied())
            .with_reject_empty_results(self.reject_empty_results)
    }
}

/// [web] 段：text2sql-web 监听端口
#[derive(Debug, Clone, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_web_port")]
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            port: default_web_port(),
        }
    }
}

fn default_web_port() -> u16 {
    8080
}

/// 从 config 目录加载配置，环境变量 TEXT2SQL__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TEXT2SQL__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TEXT2SQL")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("retry.non_retryable")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// 环境变量是进程级的，读写 TEXT2SQL__* 的测试串行执行
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_match_policy_defaults() {
        let cfg = AppConfig::default();
        let policy = cfg.retry.to_policy();
        assert_eq!(policy.max_attempts(), 3);
        assert!(!policy.is_retryable(FailureCategory::ConnectionOrAuth));
        assert!(policy.is_retryable(FailureCategory::Syntax));
        assert!(policy.is_retryable(FailureCategory::Unknown));
        assert_eq!(cfg.llm.models.error_reasoning, "gpt-4o");
        assert_eq!(cfg.database.max_tables, 10);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[retry]
max_attempts = 5
non_retryable = ["connection_or_auth", "constraint_or_type"]
reject_empty_results = true

[llm]
provider = "mock"

[llm.models]
error_reasoning = "gpt-4.1"
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.retry.max_attempts, 5);
        assert!(cfg.retry.reject_empty_results);
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.llm.models.error_reasoning, "gpt-4.1");
        assert_eq!(cfg.llm.models.sql_generator, "gpt-4o-mini");

        let policy = cfg.retry.to_policy();
        assert!(!policy.is_retryable(FailureCategory::ConstraintOrType));
        assert!(policy.rejects_empty_results());
    }

    #[test]
    fn test_env_overrides_retry_section() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let vars = [
            ("TEXT2SQL__RETRY__MAX_ATTEMPTS", "7"),
            ("TEXT2SQL__RETRY__NON_RETRYABLE", "syntax,connection_or_auth"),
            ("TEXT2SQL__RETRY__REJECT_EMPTY_RESULTS", "true"),
            ("TEXT2SQL__LLM__PROVIDER", "mock"),
        ];
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        let loaded = load_config(None);
        for (key, _) in vars {
            std::env::remove_var(key);
        }

        let cfg = loaded.unwrap();
        assert_eq!(cfg.retry.max_attempts, 7);
        assert_eq!(
            cfg.retry.non_retryable,
            vec![FailureCategory::Syntax, FailureCategory::ConnectionOrAuth]
        );
        assert!(cfg.retry.reject_empty_results);
        assert_eq!(cfg.llm.provider, "mock");
        // 未覆盖的键保持默认
        assert_eq!(cfg.database.max_tables, 10);

        let policy = cfg.retry.to_policy();
        assert_eq!(policy.max_attempts(), 7);
        assert!(!policy.is_retryable(FailureCategory::Syntax));
        assert!(policy.is_retryable(FailureCategory::SemanticMismatch));
    }
}
