//! 编排状态机的状态定义
//!
//! Generating -> Executing -> Succeeded
//!                         -> Diagnosing -> Fixing -> Executing（回环）
//!                         -> ExhaustedRetries | Aborted
//! 每个非终态携带进入下一阶段所需的全部数据；终态只携带 Outcome。

use serde::Serialize;

use crate::core::{ExecutionFailure, Outcome, Repair};

/// 阶段名（日志 / 事件投影用，不含数据）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generating,
    Executing,
    Diagnosing,
    Fixing,
    Succeeded,
    ExhaustedRetries,
    Aborted,
}

/// 带数据的运行状态
#[derive(Debug)]
pub enum RunState {
    Generating,
    /// 执行 sql；repair 为产生该 SQL 的诊断（首轮为 None）
    Executing {
        sql: String,
        repair: Option<Repair>,
    },
    Diagnosing {
        sql: String,
        failure: ExecutionFailure,
    },
    Fixing {
        sql: String,
        repair: Repair,
    },
    Done(Outcome),
}

impl RunState {
    pub fn stage(&self) -> Stage {
        match self {
            RunState::Generating => Stage::Generating,
            RunState::Executing { .. } => Stage::Executing,
            RunState::Diagnosing { .. } => Stage::Diagnosing,
            RunState::Fixing { .. } => Stage::Fixing,
            RunState::Done(Outcome::Succeeded { .. }) => Stage::Succeeded,
            RunState::Done(Outcome::ExhaustedRetries { .. }) => Stage::ExhaustedRetries,
            RunState::Done(Outcome::NonRetryableFailure { .. }) => Stage::Aborted,
        }
    }
}
