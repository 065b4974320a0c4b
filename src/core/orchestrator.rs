//! 编排器：生成 -> 执行 -> [诊断 -> 修复 -> 执行]* 的有界自纠错状态机
//!
//! 编排器本身不做 I/O，只调用三个智能体与执行器；每次迭代由当前 RunState 计算下一个 RunState。
//! 任何协作者失败都在阶段边界被转换为状态迁移，调用方总是拿到一个完整的 Outcome。
//! 取消在阶段边界生效：进行中的调用不被打断，但观察到取消后不再启动新阶段。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::agents::{
    Agents, DiagnosisRequest, ErrorFixer, ErrorReasoner, FixRequest, GenerationRequest,
    SqlGenerator,
};
use crate::core::{
    AbortReason, AgentCallError, Attempt, AttemptHistory, AttemptResult, ExecutionFailure,
    FailureClassifier, Outcome, Repair, RetryPolicy, RunEvent, RunState, Stage,
};
use crate::db::{QueryExecutor, QueryFailure, SchemaContext};

/// 开启空结果拒绝时，空结果集转为此消息的失败（分类为 Unknown，可重试）
pub const EMPTY_RESULT_MESSAGE: &str = "Query returned empty result set";

/// 单次运行的可变工作状态
struct Run<'a> {
    id: Uuid,
    question: &'a str,
    schema: &'a SchemaContext,
    policy: &'a RetryPolicy,
    executor: &'a mut dyn QueryExecutor,
    history: AttemptHistory,
}

impl Run<'_> {
    fn abort(&mut self, reason: AbortReason) -> RunState {
        tracing::warn!(reason = %reason, attempts = self.history.len(), "run aborted");
        RunState::Done(Outcome::NonRetryableFailure {
            history: std::mem::take(&mut self.history),
            reason,
        })
    }

    fn exhausted(&mut self, last_failure: ExecutionFailure) -> RunState {
        tracing::warn!(
            attempts = self.history.len(),
            category = %last_failure.category,
            "retry budget exhausted"
        );
        RunState::Done(Outcome::ExhaustedRetries {
            history: std::mem::take(&mut self.history),
            last_failure,
        })
    }
}

/// 编排器：持有三个智能体与失败分类器，可被多个并发运行共享
#[derive(Clone)]
pub struct Orchestrator {
    generator: Arc<dyn SqlGenerator>,
    reasoner: Arc<dyn ErrorReasoner>,
    fixer: Arc<dyn ErrorFixer>,
    classifier: FailureClassifier,
    event_tx: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn SqlGenerator>,
        reasoner: Arc<dyn ErrorReasoner>,
        fixer: Arc<dyn ErrorFixer>,
    ) -> Self {
        Self {
            generator,
            reasoner,
            fixer,
            classifier: FailureClassifier::new(),
            event_tx: None,
        }
    }

    pub fn from_agents(agents: &Agents) -> Self {
        Self::new(
            agents.generator.clone(),
            agents.reasoner.clone(),
            agents.fixer.clone(),
        )
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// 运行一次（不可取消）
    pub async fn run(
        &self,
        question: &str,
        schema: &SchemaContext,
        executor: &mut dyn QueryExecutor,
        policy: &RetryPolicy,
    ) -> Outcome {
        self.run_cancellable(question, schema, executor, policy, CancellationToken::new())
            .await
    }

    /// 运行一次；cancel 被触发后在下一个阶段边界以 Cancelled 终止
    pub async fn run_cancellable(
        &self,
        question: &str,
        schema: &SchemaContext,
        executor: &mut dyn QueryExecutor,
        policy: &RetryPolicy,
        cancel: CancellationToken,
    ) -> Outcome {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("text2sql_run", run_id = %id);
        let mut run = Run {
            id,
            question,
            schema,
            policy,
            executor,
            history: AttemptHistory::new(),
        };
        async move {
            tracing::info!(question, max_attempts = policy.max_attempts(), "run started");
            let mut state = RunState::Generating;
            let outcome = loop {
                let current = match state {
                    RunState::Done(outcome) => break outcome,
                    other => other,
                };
                if cancel.is_cancelled() {
                    tracing::info!(stage = ?current.stage(), "cancellation observed at stage boundary");
                    state = run.abort(AbortReason::Cancelled);
                    continue;
                }
                self.emit(RunEvent::StageStarted {
                    run_id: run.id,
                    stage: current.stage(),
                    attempt: run.history.len() as u32 + 1,
                    max_attempts: policy.max_attempts(),
                });
                state = self.step(&mut run, current).await;
            };
            tracing::info!(
                outcome = outcome.label(),
                attempts = outcome.history().len(),
                "run finished"
            );
            self.emit(RunEvent::Finished {
                run_id: run.id,
                stage: terminal_stage(&outcome),
                attempts: outcome.history().len(),
                summary: outcome.failure_summary(),
            });
            outcome
        }
        .instrument(span)
        .await
    }

    /// 状态迁移：每次调用至多触发一次外部调用
    async fn step(&self, run: &mut Run<'_>, state: RunState) -> RunState {
        match state {
            RunState::Generating => self.generate(run).await,
            RunState::Executing { sql, repair } => self.execute(run, sql, repair).await,
            RunState::Diagnosing { sql, failure } => self.diagnose(run, sql, failure).await,
            RunState::Fixing { sql, repair } => self.fix(run, sql, repair).await,
            done @ RunState::Done(_) => done,
        }
    }

    async fn generate(&self, run: &mut Run<'_>) -> RunState {
        let request = GenerationRequest {
            question: run.question,
            schema: run.schema,
        };
        match self.generator.generate(&request).await {
            Ok(generated) if !generated.sql.trim().is_empty() => {
                tracing::info!(sql = %generated.sql, "initial SQL generated");
                tracing::debug!(rationale = %generated.rationale, "generator rationale");
                RunState::Executing {
                    sql: generated.sql,
                    repair: None,
                }
            }
            Ok(_) => run.abort(AbortReason::GenerationFailed {
                error: AgentCallError::MalformedOutput("generator returned empty SQL".to_string()),
            }),
            Err(error) => run.abort(AbortReason::GenerationFailed { error }),
        }
    }

    async fn execute(&self, run: &mut Run<'_>, sql: String, repair: Option<Repair>) -> RunState {
        // 每次重新进入 Executing 前检查计数，保证执行次数不超过预算
        if !run.policy.has_budget(run.history.len()) {
            if let Some(last_failure) = run.history.last().and_then(Attempt::failure).cloned() {
                return run.exhausted(last_failure);
            }
        }

        let attempt_no = run.history.len() + 1;
        tracing::info!(attempt = attempt_no, sql = %sql, "executing SQL");
        let result = match run.executor.execute(&sql).await {
            Ok(rows) if rows.is_empty() && run.policy.rejects_empty_results() => {
                Err(QueryFailure::sql(EMPTY_RESULT_MESSAGE))
            }
            other => other,
        };

        match result {
            Ok(rows) => {
                let attempt = run
                    .history
                    .record(
                        sql.clone(),
                        AttemptResult::Success {
                            row_count: rows.row_count(),
                        },
                        repair,
                    )
                    .clone();
                tracing::info!(attempt = attempt_no, rows = rows.row_count(), "query succeeded");
                self.emit(RunEvent::AttemptRecorded {
                    run_id: run.id,
                    attempt,
                });
                RunState::Done(Outcome::Succeeded {
                    final_sql: sql,
                    rows,
                    history: std::mem::take(&mut run.history),
                })
            }
            Err(raw) => {
                let failure = self.classifier.classify(&raw);
                let attempt = run
                    .history
                    .record(
                        sql.clone(),
                        AttemptResult::Failure {
                            failure: failure.clone(),
                        },
                        repair,
                    )
                    .clone();
                tracing::info!(
                    attempt = attempt_no,
                    category = %failure.category,
                    message = %failure.message,
                    "query failed"
                );
                self.emit(RunEvent::AttemptRecorded {
                    run_id: run.id,
                    attempt,
                });

                if !run.policy.is_retryable(failure.category) {
                    run.abort(AbortReason::NonRetryableExecution { failure })
                } else if !run.policy.has_budget(run.history.len()) {
                    run.exhausted(failure)
                } else {
                    RunState::Diagnosing { sql, failure }
                }
            }
        }
    }

    async fn diagnose(&self, run: &mut Run<'_>, sql: String, failure: ExecutionFailure) -> RunState {
        let request = DiagnosisRequest {
            sql: &sql,
            failure: &failure,
            question: run.question,
            schema: run.schema,
        };
        match self.reasoner.diagnose(&request).await {
            Ok(d) if d.not_sql_request => run.abort(AbortReason::NotSqlQuestion {
                diagnosis: d.diagnosis,
            }),
            Ok(d) if d.fix_instruction.trim().is_empty() => run.abort(AbortReason::DiagnosisFailed {
                error: AgentCallError::MalformedOutput("empty fix instruction".to_string()),
            }),
            Ok(d) => {
                tracing::info!(diagnosis = %d.diagnosis, "error diagnosed");
                RunState::Fixing {
                    sql,
                    repair: Repair {
                        diagnosis: d.diagnosis,
                        fix_instruction: d.fix_instruction,
                    },
                }
            }
            Err(error) => run.abort(AbortReason::DiagnosisFailed { error }),
        }
    }

    async fn fix(&self, run: &mut Run<'_>, sql: String, repair: Repair) -> RunState {
        let request = FixRequest {
            sql: &sql,
            fix_instruction: &repair.fix_instruction,
        };
        match self.fixer.apply_fix(&request).await {
            Ok(fixed) if fixed.sql.trim().is_empty() => run.abort(AbortReason::EmptyFix { repair }),
            // 只认精确文本相等；空白差异视为新语句
            Ok(fixed) if fixed.sql == sql => run.abort(AbortReason::StuckFix { sql, repair }),
            Ok(fixed) => {
                tracing::info!(sql = %fixed.sql, "correction generated");
                RunState::Executing {
                    sql: fixed.sql,
                    repair: Some(repair),
                }
            }
            Err(error) => run.abort(AbortReason::FixFailed { error, repair }),
        }
    }
}

/// 运行终态对应的阶段名
pub fn terminal_stage(outcome: &Outcome) -> Stage {
    match outcome {
        Outcome::Succeeded { .. } => Stage::Succeeded,
        Outcome::ExhaustedRetries { .. } => Stage::ExhaustedRetries,
        Outcome::NonRetryableFailure { .. } => Stage::Aborted,
    }
}
