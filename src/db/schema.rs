//! Schema 上下文：表、列、外键与样例行的结构化描述及其文本渲染
//!
//! 每个会话构建一次，运行期间只读；同一实例传给所有智能体调用。

use std::fmt;

use serde::Serialize;

use crate::db::rows::{display_cell, QueryRows};

/// 单列信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub foreign_key: bool,
}

/// 外键：本表列 -> 引用表.列
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

/// 单表结构与样例数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKey>,
    pub sample_rows: QueryRows,
}

/// 样例行渲染时每行最多展示的列数
const SAMPLE_COLUMNS_SHOWN: usize = 3;

/// 不可变的 Schema 上下文；字段私有，构建后只能读取
#[derive(Debug, Clone, Serialize)]
pub struct SchemaContext {
    dialect: String,
    tables: Vec<TableSchema>,
    total_tables: usize,
    rendered: String,
}

impl SchemaContext {
    /// 从结构化表信息构建；tables 为已展开的表，total_tables 为库中表总数
    pub fn from_tables(
        dialect: impl Into<String>,
        tables: Vec<TableSchema>,
        total_tables: usize,
    ) -> Self {
        let dialect = dialect.into();
        let total_tables = total_tables.max(tables.len());
        let rendered = render(&dialect, &tables, total_tables);
        Self {
            dialect,
            tables,
            total_tables,
            rendered,
        }
    }

    /// 直接使用外部提供的文本描述（无结构化信息）
    pub fn from_text(dialect: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
            tables: Vec::new(),
            total_tables: 0,
            rendered: text.into(),
        }
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn total_tables(&self) -> usize {
        self.total_tables
    }

    /// 交给智能体的文本形式
    pub fn as_text(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for SchemaContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

fn render(dialect: &str, tables: &[TableSchema], total_tables: usize) -> String {
    if total_tables == 0 {
        return "No tables found in the database.".to_string();
    }

    let mut out = String::from("### Database Schema Information\n");
    out.push_str(&format!("**Database Type**: {}\n", dialect));
    out.push_str(&format!("**Tables**: {}\n\n", total_tables));

    for (i, table) in tables.iter().enumerate() {
        out.push_str(&format!("**{}. {}**\n", i + 1, table.name));
        if !table.columns.is_empty() {
            out.push_str("   Columns:\n");
            for col in &table.columns {
                let mut indicators = Vec::new();
                if col.primary_key {
                    indicators.push("PK");
                }
                if col.foreign_key {
                    indicators.push("FK");
                }
                if !col.nullable {
                    indicators.push("NOT NULL");
                }
                let indicator_str = if indicators.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", indicators.join(", "))
                };
                out.push_str(&format!(
                    "   - `{}` ({}){}\n",
                    col.name, col.data_type, indicator_str
                ));
            }
        }
        for fk in &table.foreign_keys {
            out.push_str(&format!(
                "   Relationship: `{}.{}` -> `{}.{}`\n",
                table.name, fk.column, fk.references_table, fk.references_column
            ));
        }
        if !table.sample_rows.is_empty() {
            out.push_str(&format!(
                "   Sample data ({} rows):\n",
                table.sample_rows.row_count()
            ));
            for row in &table.sample_rows.rows {
                let cells: Vec<String> = table
                    .sample_rows
                    .columns
                    .iter()
                    .zip(row.iter())
                    .take(SAMPLE_COLUMNS_SHOWN)
                    .map(|(c, v)| format!("{}: {}", c, display_cell(v)))
                    .collect();
                out.push_str(&format!("   {}...\n", cells.join(" | ")));
            }
        }
        out.push('\n');
    }

    if total_tables > tables.len() {
        out.push_str(&format!(
            "... and {} more tables\n",
            total_tables - tables.len()
        ));
    }
    out
}
