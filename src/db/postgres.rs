//! PostgreSQL 实现：information_schema 内省（当前 schema），结果按列类型解码

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, TypeInfo, ValueRef};

use crate::core::IntrospectionError;
use crate::db::convert::{
    bytes_value, convert_rows, decimal_value, float_value, introspection_error, map_sqlx_error,
    opaque_value,
};
use crate::db::{
    ColumnInfo, ForeignKey, QueryExecutor, QueryFailure, QueryRows, SchemaContext,
    SchemaIntrospector, SchemaOptions, TableSchema,
};

pub const POSTGRES_DIALECT: &str = "PostgreSQL";

const TABLES_SQL: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const COLUMNS_SQL: &str = r#"
    SELECT
        column_name::text AS column_name,
        data_type::text AS data_type,
        is_nullable::text AS is_nullable
    FROM information_schema.columns
    WHERE table_schema = current_schema() AND table_name = $1
    ORDER BY ordinal_position
"#;

const PRIMARY_KEYS_SQL: &str = r#"
    SELECT kcu.column_name::text
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
        ON tc.constraint_name = kcu.constraint_name
        AND tc.table_schema = kcu.table_schema
    WHERE tc.constraint_type = 'PRIMARY KEY'
        AND tc.table_schema = current_schema()
        AND tc.table_name = $1
    ORDER BY kcu.ordinal_position
"#;

const FOREIGN_KEYS_SQL: &str = r#"
    SELECT
        kcu.column_name::text AS column_name,
        ccu.table_name::text AS foreign_table_name,
        ccu.column_name::text AS foreign_column_name
    FROM information_schema.table_constraints AS tc
    JOIN information_schema.key_column_usage AS kcu
        ON tc.constraint_name = kcu.constraint_name
        AND tc.table_schema = kcu.table_schema
    JOIN information_schema.constraint_column_usage AS ccu
        ON ccu.constraint_name = tc.constraint_name
        AND ccu.table_schema = tc.table_schema
    WHERE tc.constraint_type = 'FOREIGN KEY'
        AND tc.table_schema = current_schema()
        AND tc.table_name = $1
"#;

pub async fn connect_postgres(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await?;
    // url 可能含密码，不写入日志
    tracing::info!(max_connections, "PostgreSQL pool connected");
    Ok(pool)
}

pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

impl PgSession {
    pub async fn acquire(pool: &PgPool) -> Result<Self, QueryFailure> {
        let conn = pool
            .acquire()
            .await
            .map_err(|e| QueryFailure::connection(e.to_string()))?;
        Ok(Self { conn })
    }

    async fn table_names(&mut self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(TABLES_SQL)
            .fetch_all(&mut *self.conn)
            .await
    }

    async fn describe_table(
        &mut self,
        name: &str,
        sample_rows: usize,
    ) -> Result<TableSchema, sqlx::Error> {
        let primary_keys = sqlx::query_scalar::<_, String>(PRIMARY_KEYS_SQL)
            .bind(name)
            .fetch_all(&mut *self.conn)
            .await?;

        let fk_rows = sqlx::query(FOREIGN_KEYS_SQL)
            .bind(name)
            .fetch_all(&mut *self.conn)
            .await?;
        let mut foreign_keys = Vec::with_capacity(fk_rows.len());
        for row in &fk_rows {
            foreign_keys.push(ForeignKey {
                column: row.try_get("column_name")?,
                references_table: row.try_get("foreign_table_name")?,
                references_column: row.try_get("foreign_column_name")?,
            });
        }

        let col_rows = sqlx::query(COLUMNS_SQL)
            .bind(name)
            .fetch_all(&mut *self.conn)
            .await?;
        let mut columns = Vec::with_capacity(col_rows.len());
        for row in &col_rows {
            let col_name: String = row.try_get("column_name")?;
            let is_nullable: String = row.try_get("is_nullable")?;
            columns.push(ColumnInfo {
                data_type: row.try_get("data_type")?,
                nullable: is_nullable == "YES",
                primary_key: primary_keys.contains(&col_name),
                foreign_key: foreign_keys.iter().any(|fk| fk.column == col_name),
                name: col_name,
            });
        }

        let sample_rows = if sample_rows == 0 {
            QueryRows::default()
        } else {
            let rows = sqlx::query(&format!(
                "SELECT * FROM {} LIMIT {}",
                quote_ident(name),
                sample_rows
            ))
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
impl QueryExecutor for PgSession {
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
impl SchemaIntrospector for PgSession {
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
        Ok(SchemaContext::from_tables(POSTGRES_DIALECT, tables, names.len()))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn cell_value(row: &PgRow, idx: usize) -> Value {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };
    let decoded = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(idx).map(Value::from),
        "INT2" => row.try_get::<i16, _>(idx).map(Value::from),
        "INT4" => row.try_get::<i32, _>(idx).map(Value::from),
        "INT8" => row.try_get::<i64, _>(idx).map(Value::from),
        "FLOAT4" => row.try_get::<f32, _>(idx).map(|v| float_value(f64::from(v))),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(float_value),
        "NUMERIC" => row.try_get::<Decimal, _>(idx).map(decimal_value),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx),
        "DATE" => row
            .try_get::<NaiveDate, _>(idx)
            .map(|v| Value::String(v.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(idx)
            .map(|v| Value::String(v.to_string())),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(idx)
            .map(|v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(idx)
            .map(|v| Value::String(v.to_rfc3339())),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(idx)
            .map(|v| Value::String(v.to_string())),
        "BYTEA" => row.try_get::<Vec<u8>, _>(idx).map(|b| bytes_value(b.len())),
        _ => row.try_get::<String, _>(idx).map(Value::String),
    };
    decoded.unwrap_or_else(|_| opaque_value(&type_name))
}
