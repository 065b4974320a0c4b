//! 按连接串选择数据库后端
//!
//! - sqlite:...            -> SqliteSession
//! - postgres(ql)://...    -> PgSession
//! - mysql://...           -> MySqlSession
//!
//! DbPool 可在多个运行间共享；DbSession 独占一个池连接，drop 时归还。

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use sqlx::postgres::PgPool;
use sqlx::sqlite::SqlitePool;

use crate::core::IntrospectionError;
use crate::db::mysql::{connect_mysql, MySqlSession, MYSQL_DIALECT};
use crate::db::postgres::{connect_postgres, PgSession, POSTGRES_DIALECT};
use crate::db::rows::display_cell;
use crate::db::sqlite::{connect_sqlite, SqliteSession, SQLITE_DIALECT};
use crate::db::{QueryExecutor, QueryFailure, QueryRows, SchemaContext, SchemaIntrospector, SchemaOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Sqlite,
    Postgres,
    MySql,
}

impl DatabaseKind {
    /// 由连接串的 scheme 判断后端；不支持的 scheme 返回 None
    pub fn from_url(url: &str) -> Option<Self> {
        let (scheme, _) = url.split_once(':')?;
        match scheme.to_ascii_lowercase().as_str() {
            "sqlite" => Some(DatabaseKind::Sqlite),
            "postgres" | "postgresql" => Some(DatabaseKind::Postgres),
            "mysql" => Some(DatabaseKind::MySql),
            _ => None,
        }
    }

    pub fn dialect(self) -> &'static str {
        match self {
            DatabaseKind::Sqlite => SQLITE_DIALECT,
            DatabaseKind::Postgres => POSTGRES_DIALECT,
            DatabaseKind::MySql => MYSQL_DIALECT,
        }
    }

    /// 列出可见数据库的语句
    fn list_databases_sql(self) -> &'static str {
        match self {
            DatabaseKind::Sqlite => "SELECT name FROM pragma_database_list ORDER BY seq",
            DatabaseKind::Postgres => {
                "SELECT datname::text FROM pg_database WHERE datistemplate = false ORDER BY datname"
            }
            DatabaseKind::MySql => "SHOW DATABASES",
        }
    }
}

#[derive(Debug, Clone)]
pub enum DbPool {
    Sqlite(SqlitePool),
    Postgres(PgPool),
    MySql(MySqlPool),
}

impl From<SqlitePool> for DbPool {
    fn from(pool: SqlitePool) -> Self {
        DbPool::Sqlite(pool)
    }
}

/// 按 scheme 建立连接池；建立时即完成一次连接，地址或凭据错误在这里暴露
pub async fn connect_pool(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<DbPool, sqlx::Error> {
    match DatabaseKind::from_url(url) {
        Some(DatabaseKind::Sqlite) => connect_sqlite(url, max_connections, acquire_timeout)
            .await
            .map(DbPool::Sqlite),
        Some(DatabaseKind::Postgres) => connect_postgres(url, max_connections, acquire_timeout)
            .await
            .map(DbPool::Postgres),
        Some(DatabaseKind::MySql) => connect_mysql(url, max_connections, acquire_timeout)
            .await
            .map(DbPool::MySql),
        None => Err(sqlx::Error::Configuration(
            "unsupported database url: expected a sqlite:, postgres:// or mysql:// url".into(),
        )),
    }
}

/// 连接失败时给出排查方向
pub fn connection_hint(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    if lower.contains("access denied") || lower.contains("password authentication failed") {
        Some("check username and password")
    } else if lower.contains("unknown database")
        || (lower.contains("database") && lower.contains("does not exist"))
    {
        Some("the database does not exist")
    } else if lower.contains("connection refused") {
        Some("cannot reach the server, check host and port")
    } else if lower.contains("timed out") || lower.contains("timeout") {
        Some("connection timed out, check network connectivity")
    } else if lower.contains("unsupported database url") {
        Some("supported backends are SQLite, PostgreSQL and MySQL")
    } else {
        None
    }
}

impl DbPool {
    pub fn kind(&self) -> DatabaseKind {
        match self {
            DbPool::Sqlite(_) => DatabaseKind::Sqlite,
            DbPool::Postgres(_) => DatabaseKind::Postgres,
            DbPool::MySql(_) => DatabaseKind::MySql,
        }
    }

    pub fn dialect(&self) -> &'static str {
        self.kind().dialect()
    }

    /// 取出一个连接作为会话；连接池超时 / 关闭以连接层 QueryFailure 报告
    pub async fn acquire(&self) -> Result<DbSession, QueryFailure> {
        Ok(match self {
            DbPool::Sqlite(pool) => DbSession::Sqlite(SqliteSession::acquire(pool).await?),
            DbPool::Postgres(pool) => DbSession::Postgres(PgSession::acquire(pool).await?),
            DbPool::MySql(pool) => DbSession::MySql(MySqlSession::acquire(pool).await?),
        })
    }

    /// 连通性检查：SELECT 1
    pub async fn ping(&self) -> Result<(), QueryFailure> {
        let mut session = self.acquire().await?;
        session.execute("SELECT 1").await.map(|_| ())
    }

    /// 服务器上可见的数据库名（SQLite 为已附加的库）
    pub async fn list_databases(&self) -> Result<Vec<String>, QueryFailure> {
        let mut session = self.acquire().await?;
        let rows = session.execute(self.kind().list_databases_sql()).await?;
        Ok(first_column(&rows))
    }

    pub async fn close(&self) {
        match self {
            DbPool::Sqlite(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::MySql(pool) => pool.close().await,
        }
    }
}

fn first_column(rows: &QueryRows) -> Vec<String> {
    rows.rows
        .iter()
        .filter_map(|row| row.first())
        .map(display_cell)
        .collect()
}

/// 独占一个池连接的会话，按后端分派
pub enum DbSession {
    Sqlite(SqliteSession),
    Postgres(PgSession),
    MySql(MySqlSession),
}

#[async_trait]
impl QueryExecutor for DbSession {
    async fn execute(&mut self, sql: &str) -> Result<QueryRows, QueryFailure> {
        match self {
            DbSession::Sqlite(s) => s.execute(sql).await,
            DbSession::Postgres(s) => s.execute(sql).await,
            DbSession::MySql(s) => s.execute(sql).await,
        }
    }
}

#[async_trait]
impl SchemaIntrospector for DbSession {
    async fn introspect(
        &mut self,
        options: &SchemaOptions,
    ) -> Result<SchemaContext, IntrospectionError> {
        match self {
            DbSession::Sqlite(s) => s.introspect(options).await,
            DbSession::Postgres(s) => s.introspect(options).await,
            DbSession::MySql(s) => s.introspect(options).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sample::create_sample_sales_database;

    #[test]
    fn test_kind_from_url() {
        assert_eq!(DatabaseKind::from_url("sqlite::memory:"), Some(DatabaseKind::Sqlite));
        assert_eq!(
            DatabaseKind::from_url("sqlite:data/sales.db?mode=rwc"),
            Some(DatabaseKind::Sqlite)
        );
        assert_eq!(
            DatabaseKind::from_url("postgres://u:p@localhost:5432/sales"),
            Some(DatabaseKind::Postgres)
        );
        assert_eq!(
            DatabaseKind::from_url("PostgreSQL://localhost/sales"),
            Some(DatabaseKind::Postgres)
        );
        assert_eq!(
            DatabaseKind::from_url("mysql://root@localhost:3306/sales"),
            Some(DatabaseKind::MySql)
        );
        assert_eq!(DatabaseKind::from_url("mssql://sa@localhost:1433"), None);
        assert_eq!(DatabaseKind::from_url("data/sales.db"), None);

        assert_eq!(DatabaseKind::Postgres.dialect(), "PostgreSQL");
        assert_eq!(DatabaseKind::MySql.dialect(), "MySQL");
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_rejected() {
        let err = connect_pool("mssql://sa:pw@localhost:1433/sales", 1, Duration::from_secs(1))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unsupported database url"));
        // 错误信息不回显连接串中的密码
        assert!(!message.contains("pw"));
        assert!(connection_hint(&message).is_some());
    }

    #[test]
    fn test_connection_hints() {
        assert_eq!(
            connection_hint("Access denied for user 'root'@'localhost'"),
            Some("check username and password")
        );
        assert_eq!(
            connection_hint("password authentication failed for user \"app\""),
            Some("check username and password")
        );
        assert_eq!(
            connection_hint("database \"sales\" does not exist"),
            Some("the database does not exist")
        );
        assert!(connection_hint("Connection refused (os error 111)").is_some());
        assert!(connection_hint("pool timed out while waiting for an open connection").is_some());
        assert_eq!(connection_hint("syntax error"), None);
    }

    #[tokio::test]
    async fn test_sqlite_pool_dispatch() {
        let sqlite = connect_sqlite("sqlite::memory:", 1, Duration::from_secs(5))
            .await
            .unwrap();
        create_sample_sales_database(&sqlite, false).await.unwrap();
        let pool = DbPool::from(sqlite);
        assert_eq!(pool.kind(), DatabaseKind::Sqlite);
        assert_eq!(pool.dialect(), SQLITE_DIALECT);

        pool.ping().await.unwrap();
        assert_eq!(pool.list_databases().await.unwrap(), vec!["main"]);

        let mut session = pool.acquire().await.unwrap();
        let ctx = session.introspect(&SchemaOptions::default()).await.unwrap();
        assert_eq!(ctx.dialect(), SQLITE_DIALECT);
        let rows = session.execute("SELECT COUNT(*) AS n FROM salesperson").await.unwrap();
        assert_eq!(rows.rows[0][0], 2);

        drop(session);
        pool.close().await;
        assert!(pool.ping().await.unwrap_err().connection_level);
    }
}
