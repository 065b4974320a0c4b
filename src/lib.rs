//! Text2SQL - Rust 多智能体 Text-to-SQL 系统
//!
//! 模块划分：
//! - **agents**: 三个推理智能体（SQL 生成 / 错误推理 / 错误修复）的能力接口与 LLM 实现
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排状态机、失败分类、重试策略、尝试历史与 Outcome
//! - **db**: Schema 上下文、查询执行器、SQLite 实现与示例数据库
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock / 重试包装）
//! - **observability**: 日志初始化
//! - **pipeline**: 会话级运行时（连接池 + 智能体 + Schema 缓存）

pub mod agents;
pub mod config;
pub mod core;
pub mod db;
pub mod llm;
pub mod observability;
pub mod pipeline;

pub use crate::core::{Orchestrator, Outcome, RetryPolicy};
pub use pipeline::Text2Sql;
