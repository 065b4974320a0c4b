//! 运行过程事件：用于 CLI / Web 展示进度（阶段、每次尝试、终态）

use serde::Serialize;
use uuid::Uuid;

use crate::core::{Attempt, Stage};

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// 进入某个阶段；attempt 为即将或刚刚执行的尝试序号
    StageStarted {
        run_id: Uuid,
        stage: Stage,
        attempt: u32,
        max_attempts: u32,
    },
    /// 一次执行已记录
    AttemptRecorded { run_id: Uuid, attempt: Attempt },
    /// 运行结束
    Finished {
        run_id: Uuid,
        stage: Stage,
        attempts: usize,
        summary: Option<String>,
    },
}
