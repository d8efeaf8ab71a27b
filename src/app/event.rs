//! 任务事件
//!
//! Send 与 Recv 通过 `(对端任务, tag)` 配对。

use serde::{Deserialize, Serialize};

use crate::net::TrafficClass;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskEvent {
    /// 计算，时长为抽象时间单位
    Compute { duration: f64 },
    Send {
        to: usize,
        bytes: u64,
        #[serde(default)]
        tag: u64,
        #[serde(default)]
        class: TrafficClass,
    },
    Recv {
        from: usize,
        bytes: u64,
        #[serde(default)]
        tag: u64,
        #[serde(default)]
        class: TrafficClass,
    },
}

impl TaskEvent {
    pub fn compute(duration: f64) -> Self {
        Self::Compute { duration }
    }

    pub fn send(to: usize, bytes: u64, tag: u64) -> Self {
        Self::Send {
            to,
            bytes,
            tag,
            class: TrafficClass::Comm,
        }
    }

    pub fn recv(from: usize, bytes: u64, tag: u64) -> Self {
        Self::Recv {
            from,
            bytes,
            tag,
            class: TrafficClass::Comm,
        }
    }

    pub fn with_class(mut self, new_class: TrafficClass) -> Self {
        match &mut self {
            Self::Send { class, .. } | Self::Recv { class, .. } => *class = new_class,
            Self::Compute { .. } => {}
        }
        self
    }

    pub fn partner(&self) -> Option<usize> {
        match *self {
            Self::Send { to, .. } => Some(to),
            Self::Recv { from, .. } => Some(from),
            Self::Compute { .. } => None,
        }
    }
}
