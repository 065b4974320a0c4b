//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! 按顺序返回预置回复；脚本耗尽后返回默认回复。同时记录调用次数与每次收到的消息，便于断言 Prompt 内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message};

/// 未配置脚本时的默认回复：一条可执行的占位 SQL
const DEFAULT_REPLY: &str = "SELECT 'no LLM configured' AS notice;";

#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    received: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            received: Mutex::new(Vec::new()),
        }
    }

    /// 便捷构造：全部为成功回复
    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::scripted(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    pub fn calls(&self) -> usize {
        self.received.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// 第 n 次调用收到的消息
    pub fn received(&self, call: usize) -> Option<Vec<Message>> {
        self.received.lock().ok()?.get(call).cloned()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut received) = self.received.lock() {
            received.push(messages.to_vec());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Ok(DEFAULT_REPLY.to_string()))
    }
}
