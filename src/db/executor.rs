//! 查询执行与 Schema 内省的协作者接口
//!
//! QueryExecutor 对 SQL 层错误从不 panic / 抛出，只返回 QueryFailure；
//! 连接层问题同样以 QueryFailure 报告，并标记 connection_level，由编排器归类为 ConnectionOrAuth。

use async_trait::async_trait;
use serde::Serialize;

use crate::core::IntrospectionError;
use crate::db::{QueryRows, SchemaContext};

/// 执行器返回的原始失败（未分类）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryFailure {
    pub message: String,
    /// 连接 / 认证层失败（与 SQL 本身无关）
    pub connection_level: bool,
}

impl QueryFailure {
    /// SQL 层失败（语法、未知列、类型等）
    pub fn sql(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            connection_level: false,
        }
    }

    /// 连接层失败（连接被拒、认证失败、连接池超时等）
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            connection_level: true,
        }
    }
}

/// 查询执行器：一次运行独占一个会话（&mut self），运行结束时释放
#[async_trait]
pub trait QueryExecutor: Send {
    async fn execute(&mut self, sql: &str) -> Result<QueryRows, QueryFailure>;
}

/// Schema 摘要的规模控制
#[derive(Debug, Clone)]
pub struct SchemaOptions {
    /// 每张表的样例行数，0 表示不取样例
    pub sample_rows: usize,
    /// 最多展开的表数
    pub max_tables: usize,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            sample_rows: 3,
            max_tables: 10,
        }
    }
}

/// Schema 内省：在进入编排循环前调用一次
#[async_trait]
pub trait SchemaIntrospector: Send {
    async fn introspect(
        &mut self,
        options: &SchemaOptions,
    ) -> Result<SchemaContext, IntrospectionError>;
}
