//! 训练闸门: 分类器重训期间暂停所有摄像头的检测

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use tracing::info;

use crate::lock;

pub struct TrainingGate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Default for TrainingGate {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingGate {
    /// 初始为打开状态
    pub fn new() -> Self {
        Self {
            open: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    /// 关闭闸门 (开始训练)
    pub fn suspend(&self) {
        *lock(&self.open) = false;
        info!("⏸️ 分类器训练中,暂停检测");
    }

    /// 打开闸门并唤醒所有等待的线程
    pub fn resume(&self) {
        *lock(&self.open) = true;
        self.cond.notify_all();
        info!("▶️ 训练完成,恢复检测");
    }

    pub fn is_open(&self) -> bool {
        *lock(&self.open)
    }

    /// 阻塞直到闸门打开
    pub fn wait(&self) {
        let mut open = lock(&self.open);
        while !*open {
            open = self
                .cond
                .wait(open)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// 最多等待 `timeout`,返回闸门是否已打开
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let open = lock(&self.open);
        let (open, _) = self
            .cond
            .wait_timeout_while(open, timeout, |open| !*open)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *open
    }
}
