//! 端到端集成测试：示例 SQLite 销售库 + 脚本化 Mock LLM

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use text2sql::agents::{Agents, PromptSet};
use text2sql::core::{AbortReason, FailureCategory, RunEvent, Stage, EMPTY_RESULT_MESSAGE};
use text2sql::db::sample::create_sample_sales_database;
use text2sql::db::{connect_sqlite, DbPool, SchemaOptions, SQLITE_DIALECT};
use text2sql::llm::MockLlmClient;
use text2sql::{Outcome, RetryPolicy, Text2Sql};

const REGION_SQL: &str = "SELECT s.region, SUM(t.volume) AS total_sales FROM salesperson s JOIN timber_sales t ON s.salesperson_id = t.salesperson_id GROUP BY s.region ORDER BY s.region";

async fn sample_pool() -> DbPool {
    let pool = connect_sqlite("sqlite::memory:", 1, Duration::from_secs(5))
        .await
        .unwrap();
    create_sample_sales_database(&pool, false).await.unwrap();
    pool.into()
}

struct Llms {
    generator: Arc<MockLlmClient>,
    reasoner: Arc<MockLlmClient>,
    fixer: Arc<MockLlmClient>,
}

impl Llms {
    fn new(generator: &[&str], reasoner: &[&str], fixer: &[&str]) -> Self {
        Self {
            generator: Arc::new(MockLlmClient::replies(generator.iter().copied())),
            reasoner: Arc::new(MockLlmClient::replies(reasoner.iter().copied())),
            fixer: Arc::new(MockLlmClient::replies(fixer.iter().copied())),
        }
    }

    fn agents(&self) -> Agents {
        Agents::from_llms(
            self.generator.clone(),
            self.reasoner.clone(),
            self.fixer.clone(),
            &PromptSet::default(),
            SQLITE_DIALECT,
        )
    }
}

fn runtime(pool: DbPool, llms: &Llms, policy: RetryPolicy) -> Text2Sql {
    Text2Sql::from_parts(pool, llms.agents(), policy, SchemaOptions::default(), None)
}

#[tokio::test]
async fn test_first_try_success_against_sample_database() {
    let llms = Llms::new(&[REGION_SQL], &[], &[]);
    let rt = runtime(sample_pool().await, &llms, RetryPolicy::default());

    let outcome = rt.ask("What are the total sales by region?").await.unwrap();
    let rows = outcome.rows().expect("run should succeed");
    assert_eq!(rows.columns, vec!["region", "total_sales"]);
    assert_eq!(rows.rows[0][0], "North");
    assert_eq!(rows.rows[0][1], 445.0);
    assert_eq!(rows.rows[1][0], "South");
    assert_eq!(rows.rows[1][1], 575.0);
    assert_eq!(outcome.history().len(), 1);
    assert_eq!(llms.reasoner.calls(), 0);
    assert_eq!(llms.fixer.calls(), 0);

    // 生成 Prompt 中带有内省得到的 Schema
    let prompt = &llms.generator.received(0).unwrap()[0].content;
    assert!(prompt.contains("timber_sales"));
    assert!(prompt.contains("What are the total sales by region?"));
}

#[tokio::test]
async fn test_unknown_column_is_diagnosed_and_fixed() {
    let llms = Llms::new(
        &["```sql\nSELECT regn, SUM(volume) FROM timber_sales GROUP BY regn\n```"],
        &["DIAGNOSIS: timber_sales has no column regn; region lives in salesperson\nFIX: join salesperson on salesperson_id and group by salesperson.region"],
        &[REGION_SQL],
    );
    let rt = runtime(sample_pool().await, &llms, RetryPolicy::default());

    let outcome = rt.ask("What are the total sales by region?").await.unwrap();
    assert!(outcome.is_success(), "unexpected outcome: {:?}", outcome);
    assert_eq!(outcome.final_sql(), Some(REGION_SQL));

    let history = outcome.history();
    assert_eq!(history.len(), 2);
    let first = history.get(0).unwrap().failure().unwrap();
    assert_eq!(first.category, FailureCategory::SemanticMismatch);
    assert_eq!(first.fragment.as_deref(), Some("regn"));
    assert_eq!(
        history.get(1).unwrap().diagnosis(),
        Some("timber_sales has no column regn; region lives in salesperson")
    );

    // 修复 Prompt 拿到的是 FIX 段与失败的 SQL
    let fix_prompt = &llms.fixer.received(0).unwrap()[0].content;
    assert!(fix_prompt.contains("join salesperson on salesperson_id"));
    assert!(fix_prompt.contains("SELECT regn, SUM(volume) FROM timber_sales GROUP BY regn"));
}

#[tokio::test]
async fn test_persistent_syntax_errors_exhaust_budget() {
    let llms = Llms::new(
        &["SELEC * FROM salesperson"],
        &[
            "DIAGNOSIS: misspelled keyword\nFIX: spell SELECT correctly",
            "DIAGNOSIS: misspelled keyword\nFIX: spell SELECT correctly",
        ],
        &["SELEC name FROM salesperson", "SELEC region FROM salesperson"],
    );
    let rt = runtime(sample_pool().await, &llms, RetryPolicy::new(3));

    let outcome = rt.ask("list salespeople").await.unwrap();
    match &outcome {
        Outcome::ExhaustedRetries {
            history,
            last_failure,
        } => {
            assert_eq!(history.len(), 3);
            assert!(history.iter().all(|a| !a.succeeded()));
            assert_eq!(last_failure.category, FailureCategory::Syntax);
        }
        other => panic!("expected ExhaustedRetries, got {:?}", other),
    }
    assert_eq!(llms.reasoner.calls(), 2);
    assert_eq!(llms.fixer.calls(), 2);
}

#[tokio::test]
async fn test_empty_result_rejection_triggers_repair() {
    let llms = Llms::new(
        &["SELECT name FROM salesperson WHERE region = 'East'"],
        &["DIAGNOSIS: no salesperson is in region East\nFIX: the regions are North and South; use North"],
        &["SELECT name FROM salesperson WHERE region = 'North'"],
    );
    let policy = RetryPolicy::default().with_reject_empty_results(true);
    let rt = runtime(sample_pool().await, &llms, policy);

    let outcome = rt.ask("who sells in the east?").await.unwrap();
    assert!(outcome.is_success());
    let first = outcome.history().get(0).unwrap().failure().unwrap();
    assert_eq!(first.message, EMPTY_RESULT_MESSAGE);
    assert_eq!(outcome.rows().unwrap().rows[0][0], "John Doe");
}

#[tokio::test]
async fn test_non_sql_question_aborts() {
    let llms = Llms::new(
        &["SELECT weather FROM salesperson"],
        &["The user is asking about the weather, not the database. SELECT \"NOT ASKING FOR SQL\";"],
        &[],
    );
    let rt = runtime(sample_pool().await, &llms, RetryPolicy::default());

    let outcome = rt.ask("will it rain tomorrow?").await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::NonRetryableFailure {
            reason: AbortReason::NotSqlQuestion { .. },
            ..
        }
    ));
    assert_eq!(llms.fixer.calls(), 0);
}

#[tokio::test]
async fn test_shutdown_cancels_runs() {
    let llms = Llms::new(&[REGION_SQL], &[], &[]);
    let rt = runtime(sample_pool().await, &llms, RetryPolicy::default());
    rt.schema().await.unwrap();
    rt.supervisor().shutdown();

    let outcome = rt.ask("total sales by region").await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::NonRetryableFailure {
            reason: AbortReason::Cancelled,
            ..
        }
    ));
    assert_eq!(llms.generator.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_runs_share_schema() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("sales.db").display());
    let pool = connect_sqlite(&url, 4, Duration::from_secs(5)).await.unwrap();
    create_sample_sales_database(&pool, true).await.unwrap();
    let pool = DbPool::from(pool);

    let llms = Llms::new(
        &[
            "SELECT COUNT(*) AS n FROM salesperson",
            "SELECT COUNT(*) AS n FROM salesperson",
        ],
        &[],
        &[],
    );
    let rt = runtime(pool, &llms, RetryPolicy::default());

    let (a, b) = tokio::join!(rt.ask("how many salespeople?"), rt.ask("count the salespeople"));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.is_success() && b.is_success());
    assert_eq!(a.rows().unwrap().rows[0][0], 2);

    let schema = rt.schema().await.unwrap();
    assert!(schema.table("products").is_some());
    rt.close().await;
}

#[tokio::test]
async fn test_events_follow_the_repair_loop() {
    let llms = Llms::new(
        &["SELECT regn FROM salesperson"],
        &["DIAGNOSIS: wrong column\nFIX: use region"],
        &["SELECT region FROM salesperson"],
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let rt = runtime(sample_pool().await, &llms, RetryPolicy::default()).with_event_tx(tx);

    let outcome = rt.ask("list regions").await.unwrap();
    assert!(outcome.is_success());

    let mut finished = None;
    let mut recorded = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            RunEvent::AttemptRecorded { .. } => recorded += 1,
            RunEvent::Finished {
                stage, attempts, ..
            } => finished = Some((stage, attempts)),
            RunEvent::StageStarted { .. } => {}
        }
    }
    assert_eq!(recorded, 2);
    assert_eq!(finished, Some((Stage::Succeeded, 2)));
}
