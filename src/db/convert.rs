//! sqlx 行 / 错误到 QueryRows、QueryFailure 的转换，三个后端共用

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{Column, Row};

use crate::core::IntrospectionError;
use crate::db::{QueryFailure, QueryRows};

/// sqlx 错误 -> QueryFailure
///
/// 数据库返回的错误为 SQL 层，但 SQLSTATE 08（连接异常）、28（认证失败）、57P（连接被管理员终止）除外；
/// IO / TLS / 连接池错误为连接层。
pub(crate) fn map_sqlx_error(e: sqlx::Error) -> QueryFailure {
    match e {
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            let connection_level = db
                .code()
                .is_some_and(|code| is_connection_sqlstate(&code));
            if connection_level {
                QueryFailure::connection(message)
            } else {
                QueryFailure::sql(message)
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Configuration(_) => QueryFailure::connection(e.to_string()),
        other => QueryFailure::sql(other.to_string()),
    }
}

/// SQLite 的错误码是数字，只有 5 位 SQLSTATE 才参与判断
fn is_connection_sqlstate(code: &str) -> bool {
    code.len() == 5 && (code.starts_with("08") || code.starts_with("28") || code.starts_with("57P"))
}

pub(crate) fn introspection_error(e: sqlx::Error) -> IntrospectionError {
    match map_sqlx_error(e) {
        f if f.connection_level => IntrospectionError::Connection(f.message),
        f => IntrospectionError::Query(f.message),
    }
}

/// 按行逐格解码；列名取自第一行（空结果没有列信息）
pub(crate) fn convert_rows<R: Row>(rows: &[R], cell: impl Fn(&R, usize) -> Value) -> QueryRows {
    let columns = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let values = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| cell(row, i)).collect())
        .collect();
    QueryRows::new(columns, values)
}

pub(crate) fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// 定点数优先转为 JSON 数字，超出 f64 表示范围时保留文本
pub(crate) fn decimal_value(d: Decimal) -> Value {
    d.to_f64()
        .map(float_value)
        .unwrap_or_else(|| Value::String(d.to_string()))
}

pub(crate) fn bytes_value(len: usize) -> Value {
    Value::String(format!("<{} bytes>", len))
}

/// 无法解码的类型以类型名占位
pub(crate) fn opaque_value(type_name: &str) -> Value {
    Value::String(format!("<{}>", type_name))
}
