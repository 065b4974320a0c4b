//! 查询结果：列名 + 行（单元格为 JSON 值，便于序列化给 Web 前端）

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 表格型查询结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 渲染为对齐的纯文本表格；超过 max_rows 时追加 "... and N more rows"
    pub fn render_table(&self, max_rows: usize) -> String {
        if self.columns.is_empty() {
            return "(no rows)".to_string();
        }
        let shown: Vec<Vec<String>> = self
            .rows
            .iter()
            .take(max_rows)
            .map(|row| row.iter().map(display_cell).collect())
            .collect();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &shown {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let format_line = |cells: &[String]| {
            cells
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{:<width$}", c, width = widths.get(i).copied().unwrap_or(0)))
                .collect::<Vec<_>>()
                .join(" | ")
        };

        let mut out = String::new();
        out.push_str(&format_line(&self.columns));
        out.push('\n');
        out.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in &shown {
            out.push('\n');
            out.push_str(&format_line(row));
        }
        if self.rows.len() > max_rows {
            out.push_str(&format!("\n... and {} more rows", self.rows.len() - max_rows));
        }
        out
    }
}

/// 单元格显示：字符串去引号，NULL 显示为 NULL
pub fn display_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_table_truncates() {
        let rows = QueryRows::new(
            vec!["region".into(), "total".into()],
            vec![
                vec![json!("North"), json!(445.0)],
                vec![json!("South"), json!(575.0)],
                vec![json!(null), json!(1)],
            ],
        );
        let table = rows.render_table(2);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "region | total");
        assert_eq!(lines[2], "North  | 445.0");
        assert_eq!(lines.last().copied(), Some("... and 1 more rows"));
        assert!(!table.contains("NULL"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(QueryRows::default().render_table(10), "(no rows)");
    }
}
