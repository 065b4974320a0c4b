//! text2sql 命令行
//!
//! 用法：
//!   text2sql [--config PATH] [--json] [问题...]
//! 给出问题时回答一次后退出；否则进入交互模式，逐行读取问题。
//! 交互命令：schema 打印 Schema 摘要，databases 列出可见数据库，quit / exit 退出。

use std::path::PathBuf;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use text2sql::config::{load_config, AppConfig};
use text2sql::core::{AttemptResult, RunEvent};
use text2sql::{observability, Outcome, Text2Sql};

/// 终端最多展示的结果行数
const MAX_DISPLAY_ROWS: usize = 10;

struct CliArgs {
    config: Option<PathBuf>,
    json: bool,
    question: Option<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut config = None;
    let mut json = false;
    let mut words = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().context("--config requires a path")?;
                config = Some(PathBuf::from(path));
            }
            "--json" => json = true,
            "--help" | "-h" => {
                bail!("usage: text2sql [--config PATH] [--json] [QUESTION...]");
            }
            _ => words.push(arg),
        }
    }
    let question = (!words.is_empty()).then(|| words.join(" "));
    Ok(CliArgs {
        config,
        json,
        question,
    })
}

/// 终端展示：最终 SQL、结果表、每次尝试的轨迹
fn render_outcome(outcome: &Outcome, max_rows: usize) -> String {
    let mut out = String::new();
    match outcome {
        Outcome::Succeeded {
            final_sql, rows, ..
        } => {
            out.push_str(&format!("SQL: {}\n\n", final_sql));
            out.push_str(&rows.render_table(max_rows));
            out.push('\n');
        }
        _ => {
            if let Some(summary) = outcome.failure_summary() {
                out.push_str(&format!("No answer: {}\n", summary));
            }
            if let Outcome::NonRetryableFailure { reason, .. } = outcome {
                if let Some(repair) = reason.repair() {
                    out.push_str(&format!("Last diagnosis: {}\n", repair.diagnosis));
                }
            }
        }
    }

    let history = outcome.history();
    if history.len() > 1 || !outcome.is_success() {
        out.push_str("\nAttempts:\n");
        for attempt in history {
            if let Some(diagnosis) = attempt.diagnosis() {
                out.push_str(&format!("  diagnosis: {}\n", diagnosis));
            }
            let status = match &attempt.result {
                AttemptResult::Success { row_count } => format!("ok, {} rows", row_count),
                AttemptResult::Failure { failure } => failure.to_string(),
            };
            out.push_str(&format!("  #{} {}\n     {}\n", attempt.sequence, status, attempt.sql));
        }
    }
    out
}

async fn answer(runtime: &Text2Sql, question: &str, json: bool) -> anyhow::Result<()> {
    let outcome = runtime
        .ask(question)
        .await
        .context("Failed to run question")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", render_outcome(&outcome, MAX_DISPLAY_ROWS));
    }
    Ok(())
}

async fn repl(runtime: &Text2Sql, json: bool) -> anyhow::Result<()> {
    let schema = runtime.schema().await.context("Schema introspection failed")?;
    println!(
        "Connected ({}, {} tables). Ask a question, 'schema', 'databases', or 'quit' to exit.",
        schema.dialect(),
        schema.total_tables()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if runtime.supervisor().is_shutdown() {
            break;
        }
        eprint!("> ");
        // Ctrl+C 时不必等到下一个换行
        let line = tokio::select! {
            _ = runtime.supervisor().cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        let question = line.trim();
        match question {
            "" => continue,
            "quit" | "exit" => break,
            "schema" => println!("{}", schema),
            "databases" => match runtime.databases().await {
                Ok(names) => println!("{}", names.join("\n")),
                Err(e) => eprintln!("error: {}", e),
            },
            _ => {
                if let Err(e) = answer(runtime, question, json).await {
                    eprintln!("error: {:#}", e);
                }
            }
        }
    }
    Ok(())
}

/// 把阶段事件打印到 stderr，作为进度提示
fn spawn_progress_printer(mut rx: mpsc::UnboundedReceiver<RunEvent>) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let RunEvent::StageStarted {
                stage,
                attempt,
                max_attempts,
                ..
            } = event
            {
                eprintln!("  [{}/{}] {:?}", attempt.min(max_attempts), max_attempts, stage);
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_with_default("warn");

    let args = parse_args(std::env::args().skip(1))?;
    let cfg = load_config(args.config.clone()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let runtime = Text2Sql::connect(&cfg)
        .await
        .context("Failed to start text2sql runtime")?
        .with_event_tx(event_tx);
    if !args.json {
        spawn_progress_printer(event_rx);
    }

    // Ctrl+C：取消进行中的运行，交互模式随之退出
    let supervisor = runtime.supervisor().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ncancelling...");
            supervisor.shutdown();
        }
    });

    let result = match &args.question {
        Some(question) => answer(&runtime, question, args.json).await,
        None => repl(&runtime, args.json).await,
    };
    runtime.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use text2sql::core::{AbortReason, AttemptHistory, ExecutionFailure, FailureCategory, Repair};
    use text2sql::db::QueryRows;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let parsed = parse_args(args(&["--json", "total", "sales", "by", "region"])).unwrap();
        assert!(parsed.json);
        assert_eq!(parsed.question.as_deref(), Some("total sales by region"));
        assert!(parsed.config.is_none());

        let parsed = parse_args(args(&["-c", "my.toml"])).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("my.toml")));
        assert!(parsed.question.is_none());

        assert!(parse_args(args(&["--config"])).is_err());
    }

    #[test]
    fn test_render_failed_outcome_lists_attempts() {
        let failure = ExecutionFailure {
            category: FailureCategory::SemanticMismatch,
            message: "no such column: regn".to_string(),
            fragment: Some("regn".to_string()),
        };
        let mut history = AttemptHistory::new();
        history.record(
            "SELECT regn FROM salesperson",
            AttemptResult::Failure {
                failure: failure.clone(),
            },
            None,
        );
        history.record(
            "SELECT regn2 FROM salesperson",
            AttemptResult::Failure {
                failure: failure.clone(),
            },
            Some(Repair {
                diagnosis: "regn is not a column".to_string(),
                fix_instruction: "use region".to_string(),
            }),
        );
        let outcome = Outcome::ExhaustedRetries {
            history,
            last_failure: failure,
        };

        let text = render_outcome(&outcome, 10);
        assert!(text.starts_with("No answer: gave up after 2 attempts"));
        assert!(text.contains("#1 [semantic_mismatch] no such column: regn"));
        assert!(text.contains("diagnosis: regn is not a column"));
    }

    #[test]
    fn test_render_success_shows_sql_and_table() {
        let mut history = AttemptHistory::new();
        history.record("SELECT 1 AS n", AttemptResult::Success { row_count: 1 }, None);
        let outcome = Outcome::Succeeded {
            final_sql: "SELECT 1 AS n".to_string(),
            rows: QueryRows::new(vec!["n".to_string()], vec![vec![serde_json::json!(1)]]),
            history,
        };
        let text = render_outcome(&outcome, 10);
        assert!(text.starts_with("SQL: SELECT 1 AS n"));
        assert!(!text.contains("Attempts:"));

        let aborted = Outcome::NonRetryableFailure {
            history: AttemptHistory::new(),
            reason: AbortReason::Cancelled,
        };
        assert!(render_outcome(&aborted, 10).contains("run cancelled"));
    }

    #[test]
    fn test_render_stuck_fix_keeps_diagnosis() {
        let mut history = AttemptHistory::new();
        history.record(
            "SELECT regn FROM salesperson",
            AttemptResult::Failure {
                failure: ExecutionFailure {
                    category: FailureCategory::SemanticMismatch,
                    message: "no such column: regn".to_string(),
                    fragment: Some("regn".to_string()),
                },
            },
            None,
        );
        let outcome = Outcome::NonRetryableFailure {
            history,
            reason: AbortReason::StuckFix {
                sql: "SELECT regn FROM salesperson".to_string(),
                repair: Repair {
                    diagnosis: "regn is not a column".to_string(),
                    fix_instruction: "use region".to_string(),
                },
            },
        };
        let text = render_outcome(&outcome, 10);
        assert!(text.contains("unchanged"));
        assert!(text.contains("Last diagnosis: regn is not a column"));
    }
}
