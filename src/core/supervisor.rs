//! 运行监管：取消令牌的层级管理
//!
//! 根 token 在进程退出（Ctrl+C）时取消；每次运行拿一个子 token，可单独取消或设超时。

use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RunSupervisor {
    root: CancellationToken,
    run_timeout: Option<Duration>,
}

impl RunSupervisor {
    /// run_timeout 为 None 时单次运行不限时
    pub fn new(run_timeout: Option<Duration>) -> Self {
        Self {
            root: CancellationToken::new(),
            run_timeout,
        }
    }

    /// 取消所有进行中与之后的运行
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.root.is_cancelled()
    }

    /// 等待 shutdown
    pub async fn cancelled(&self) {
        self.root.cancelled().await
    }

    /// 为一次运行创建子 token；配置了超时则到点自动取消
    ///
    /// 返回的 guard 被丢弃时定时器一并停止。
    pub fn begin_run(&self) -> RunGuard {
        let token = self.root.child_token();
        let timer = self.run_timeout.map(|timeout| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {
                        tracing::warn!(timeout_secs = timeout.as_secs(), "run timed out, cancelling");
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            })
        });
        RunGuard { token, timer }
    }
}

impl Default for RunSupervisor {
    fn default() -> Self {
        Self::new(None)
    }
}

/// 单次运行的取消句柄
#[derive(Debug)]
pub struct RunGuard {
    token: CancellationToken,
    timer: Option<tokio::task::JoinHandle<()>>,
}

impl RunGuard {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
