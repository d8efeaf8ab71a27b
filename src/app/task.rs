//! 单个任务的事件状态机
//!
//! 事件从 `pending`（尚未发生）进入 `occurring`（正在消耗 CPU 或带宽），完成后退役。
//! - 计算独占任务：进行中时其后的事件都不能开始；
//! - Send 是非阻塞的，最多 `window` 个同时在途（0 表示不限）；
//! - Recv 从不“进行中”，位于队首且对应消息的全部子流都已到达时直接退役。

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;

use super::event::TaskEvent;
use crate::net::TrafficClass;

#[derive(Debug, Clone, PartialEq)]
pub enum Occurring {
    Compute { remaining: f64 },
    Send { subflows_left: usize },
}

/// 队首事件此刻可以做什么
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    StartCompute {
        duration: f64,
    },
    Inject {
        to: usize,
        bytes: u64,
        tag: u64,
        class: TrafficClass,
    },
    Consume {
        from: usize,
        tag: u64,
    },
    Wait,
}

#[derive(Debug, Clone, Default)]
pub struct TaskState {
    pub pending: VecDeque<TaskEvent>,
    /// 事件序号 -> 进行中的事件
    pub occurring: IndexMap<u64, Occurring>,
    next_seq: u64,
    pub pending_cpu: usize,
    pub pending_flows: usize,
    /// 已完整到达、尚未被 Recv 消费的消息：`(发送方, tag) -> 条数`
    delivered: HashMap<(usize, u64), usize>,
    pub finished: bool,
    pub cpu_time: f64,
}

impl TaskState {
    pub fn new(events: Vec<TaskEvent>) -> Self {
        Self {
            pending: events.into(),
            ..Self::default()
        }
    }

    pub fn poll(&self, window: usize) -> Step {
        let Some(head) = self.pending.front() else {
            return Step::Wait;
        };
        if self.pending_cpu > 0 {
            return Step::Wait;
        }
        match *head {
            TaskEvent::Compute { duration } => Step::StartCompute { duration },
            TaskEvent::Send {
                to,
                bytes,
                tag,
                class,
            } => {
                if window > 0 && self.pending_flows >= window {
                    Step::Wait
                } else {
                    Step::Inject {
                        to,
                        bytes,
                        tag,
                        class,
                    }
                }
            }
            TaskEvent::Recv { from, tag, .. } => {
                if self.delivered.get(&(from, tag)).copied().unwrap_or(0) > 0 {
                    Step::Consume { from, tag }
                } else {
                    Step::Wait
                }
            }
        }
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// 队首计算开始；时长不为正时直接退役
    pub fn start_compute(&mut self, duration: f64) {
        self.pending.pop_front();
        if duration > 0.0 {
            let seq = self.take_seq();
            self.occurring
                .insert(seq, Occurring::Compute { remaining: duration });
            self.pending_cpu += 1;
        }
    }

    /// 队首 Send 以 `subflows` 个子流注入，返回其事件序号
    pub fn start_send(&mut self, subflows: usize) -> u64 {
        self.pending.pop_front();
        let seq = self.take_seq();
        self.occurring.insert(
            seq,
            Occurring::Send {
                subflows_left: subflows,
            },
        );
        self.pending_flows += 1;
        seq
    }

    /// 收发两端在同一服务器上，不经网络直接完成
    pub fn complete_local_send(&mut self) {
        self.pending.pop_front();
    }

    pub fn consume_recv(&mut self, from: usize, tag: u64) {
        self.pending.pop_front();
        if let Some(n) = self.delivered.get_mut(&(from, tag)) {
            *n -= 1;
            if *n == 0 {
                self.delivered.remove(&(from, tag));
            }
        }
    }

    pub fn deliver(&mut self, from: usize, tag: u64) {
        *self.delivered.entry((from, tag)).or_insert(0) += 1;
    }

    /// 一个子流结束；整条消息的子流都结束时返回 `true`
    pub fn subflow_done(&mut self, seq: u64) -> bool {
        let Some(Occurring::Send { subflows_left }) = self.occurring.get_mut(&seq) else {
            return false;
        };
        *subflows_left -= 1;
        if *subflows_left > 0 {
            return false;
        }
        self.occurring.swap_remove(&seq);
        self.pending_flows -= 1;
        true
    }

    /// 推进进行中的计算，返回本步完成的计算数
    pub fn tick_cpu(&mut self, dt: f64, eps: f64) -> usize {
        let mut done = Vec::new();
        for (&seq, occ) in self.occurring.iter_mut() {
            if let Occurring::Compute { remaining } = occ {
                let used = dt.min(*remaining);
                *remaining -= dt;
                self.cpu_time += used;
                if *remaining <= eps {
                    done.push(seq);
                }
            }
        }
        for seq in &done {
            self.occurring.swap_remove(seq);
            self.pending_cpu -= 1;
        }
        done.len()
    }

    pub fn cpu_remaining(&self) -> impl Iterator<Item = f64> + '_ {
        self.occurring.values().filter_map(|occ| match occ {
            Occurring::Compute { remaining } => Some(*remaining),
            Occurring::Send { .. } => None,
        })
    }

    /// 没有待发生和进行中的事件
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.pending_cpu == 0 && self.pending_flows == 0
    }
}
