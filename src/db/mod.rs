//! 数据库层：Schema 上下文、查询结果、执行器 / 内省接口与 SQLite / PostgreSQL / MySQL 实现

mod convert;
pub mod executor;
pub mod mysql;
pub mod pool;
pub mod postgres;
pub mod rows;
pub mod sample;
pub mod schema;
pub mod sqlite;

pub use executor::{QueryExecutor, QueryFailure, SchemaIntrospector, SchemaOptions};
pub use mysql::{MySqlSession, MYSQL_DIALECT};
pub use pool::{connect_pool, connection_hint, DatabaseKind, DbPool, DbSession};
pub use postgres::{PgSession, POSTGRES_DIALECT};
pub use rows::QueryRows;
pub use schema::{ColumnInfo, ForeignKey, SchemaContext, TableSchema};
pub use sqlite::{connect_sqlite, SqliteSession, SQLITE_DIALECT};
