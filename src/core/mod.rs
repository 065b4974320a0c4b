//! 核心编排层：失败分类、重试策略、尝试历史、状态机与主控循环

pub mod classifier;
pub mod error;
pub mod events;
pub mod history;
pub mod orchestrator;
pub mod outcome;
pub mod policy;
pub mod state;
pub mod supervisor;

pub use classifier::{extract_fragment, ExecutionFailure, FailureCategory, FailureClassifier};
pub use error::{AbortReason, AgentCallError, IntrospectionError};
pub use events::RunEvent;
pub use history::{Attempt, AttemptHistory, AttemptResult, Repair};
pub use orchestrator::{terminal_stage, Orchestrator, EMPTY_RESULT_MESSAGE};
pub use outcome::Outcome;
pub use policy::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use state::{RunState, Stage};
pub use supervisor::{RunGuard, RunSupervisor};
