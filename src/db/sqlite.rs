//! SQLite 实现：连接池、会话（执行 + 内省）
//!
//! 每次运行从池中取出一个连接包装为 SqliteSession；会话被 drop 时连接自动归还连接池。
//! 表结构来自 sqlite_master 与 PRAGMA table_info / foreign_key_list。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, TypeInfo, ValueRef};

use crate::core::IntrospectionError;
use crate::db::convert::{
    bytes_value, convert_rows, float_value, introspection_error, map_sqlx_error,
};
use crate::db::{
    ColumnInfo, ForeignKey, QueryExecutor, QueryFailure, QueryRows, SchemaContext,
    SchemaIntrospector, SchemaOptions, TableSchema,
};

pub const SQLITE_DIALECT: &str = "SQLite";

/// 创建 SQLite 连接池；内存库只能使用单连接（每个连接各自一份内存库），且不回收空闲连接
pub async fn connect_sqlite(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<SqlitePool, sqlx::Error> {
    let in_memory = url.contains(":memory:") || url.contains("mode=memory");
    let options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections.max(1))
    };
    let pool = options.acquire_timeout(acquire_timeout).connect(url).await?;
    tracing::info!(url, in_memory, "SQLite pool connected");
    Ok(pool)
}

/// 独占一个池连接的会话
pub struct SqliteSession {
    conn: PoolConnection<Sqlite>,
}

impl SqliteSession {
    /// 从连接池取出连接；连接池超时 / 关闭以 QueryFailure::connection 报告
    pub async fn acquire(pool: &SqlitePool) -> Result<Self, QueryFailure> {
        let conn = pool
            .acquire()
            .await
            .map_err(|e| QueryFailure::connection(e.to_string()))?;
        Ok(Self { conn })
    }

    async fn table_names(&mut self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    async fn describe_table(
        &mut self,
        name: &str,
        sample_rows: usize,
    ) -> Result<TableSchema, sqlx::Error> {
        let ident = quote_ident(name);

        let fk_rows = sqlx::query(&format!("PRAGMA foreign_key_list({})", ident))
            .fetch_all(&mut *self.conn)
            .await?;
        let mut foreign_keys = Vec::with_capacity(fk_rows.len());
        for row in &fk_rows {
            foreign_keys.push(ForeignKey {
                column: row.try_get("from")?,
                references_table: row.try_get("table")?,
                references_column: row
                    .try_get::<Option<String>, _>("to")?
                    .unwrap_or_default(),
            });
        }

        let col_rows = sqlx::query(&format!("PRAGMA table_info({})", ident))
            .fetch_all(&mut *self.conn)
            .await?;
        let mut columns = Vec::with_capacity(col_rows.len());
        for row in &col_rows {
            let col_name: String = row.try_get("name")?;
            let notnull: i64 = row.try_get("notnull")?;
            let pk: i64 = row.try_get("pk")?;
            let foreign_key = foreign_keys.iter().any(|fk| fk.column == col_name);
            columns.push(ColumnInfo {
                data_type: row.try_get("type")?,
                nullable: notnull == 0,
                primary_key: pk > 0,
                foreign_key,
                name: col_name,
            });
        }

        let sample_rows = if sample_rows == 0 {
            QueryRows::default()
        } else {
            let rows = sqlx::query(&format!("SELECT * FROM {} LIMIT {}", ident, sample_rows))
                .fetch_all(&mut *self.conn)
                .await?;
            convert_rows(&rows, cell_value)
        };

        Ok(TableSchema {
            name: name.to_string(),
            columns,
            foreign_keys,
            sample_rows,
        })
    }
}

#[async_trait]
impl QueryExecutor for SqliteSession {
    async fn execute(&mut self, sql: &str) -> Result<QueryRows, QueryFailure> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(QueryFailure::sql("Empty query"));
        }
        let start = Instant::now();
        let result = sqlx::query(sql).fetch_all(&mut *self.conn).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(rows) => {
                tracing::debug!(rows = rows.len(), duration_ms, "query executed");
                Ok(convert_rows(&rows, cell_value))
            }
            Err(e) => {
                tracing::debug!(error = %e, duration_ms, "query failed");
                Err(map_sqlx_error(e))
            }
        }
    }
}

#[async_trait]
impl SchemaIntrospector for SqliteSession {
    async fn introspect(
        &mut self,
        options: &SchemaOptions,
    ) -> Result<SchemaContext, IntrospectionError> {
        let names = self.table_names().await.map_err(introspection_error)?;
        let mut tables = Vec::with_capacity(names.len().min(options.max_tables));
        for name in names.iter().take(options.max_tables) {
            let table = self
                .describe_table(name, options.sample_rows)
                .await
                .map_err(introspection_error)?;
            tables.push(table);
        }
        tracing::info!(
            tables = names.len(),
            described = tables.len(),
            "schema introspected"
        );
        Ok(SchemaContext::from_tables(SQLITE_DIALECT, tables, names.len()))
    }
}

/// 双引号包裹标识符，内部双引号转义
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// 按值的实际存储类型解码（SQLite 列类型是动态的，聚合列没有声明类型）
fn cell_value(row: &SqliteRow, idx: usize) -> Value {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };
    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" | "NUMERIC" => row
            .try_get_unchecked::<f64, _>(idx)
            .map(float_value)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .map(|b| bytes_value(b.len()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get_unchecked::<String, _>(idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
