//! 流量内核
//!
//! 内核为一个应用生成每个参与者（先任务、后存储节点）的有序事件队列。
//! 仿真引擎只通过 [`TrafficKernel`] 使用它们；这里附带几个常用的参考实现。

use std::collections::HashMap;

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::event::TaskEvent;
use crate::error::{Result, SimError};
use crate::net::TrafficClass;

pub trait TrafficKernel: std::fmt::Debug {
    fn name(&self) -> &str;

    /// 返回长度为 `tasks + storage` 的事件队列列表
    fn generate(&self, tasks: usize, storage: usize, rng: &mut StdRng) -> Result<Vec<Vec<TaskEvent>>>;
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KernelSpec {
    /// 每个任务只做一次计算
    ComputeOnly { duration: f64 },
    /// 全交换：每个任务向其他所有任务各发一条
    AllToAll { bytes: u64 },
    /// 环：每轮先计算，再向右邻居发送、从左邻居接收
    Ring {
        bytes: u64,
        #[serde(default = "one")]
        rounds: u32,
        #[serde(default)]
        compute: f64,
    },
    /// 每个任务随机挑 `messages` 个对端发送
    RandomPairs { bytes: u64, messages: u32 },
    /// 任务 i 与存储节点 `i % storage` 之间做一次读或写
    StorageIo { bytes: u64, class: TrafficClass },
    /// 直接给出每个参与者的事件
    Explicit { tasks: Vec<Vec<TaskEvent>> },
}

impl TrafficKernel for KernelSpec {
    fn name(&self) -> &str {
        match self {
            Self::ComputeOnly { .. } => "compute_only",
            Self::AllToAll { .. } => "all_to_all",
            Self::Ring { .. } => "ring",
            Self::RandomPairs { .. } => "random_pairs",
            Self::StorageIo { .. } => "storage_io",
            Self::Explicit { .. } => "explicit",
        }
    }

    fn generate(&self, tasks: usize, storage: usize, rng: &mut StdRng) -> Result<Vec<Vec<TaskEvent>>> {
        let mut queues: Vec<Vec<TaskEvent>> = vec![Vec::new(); tasks + storage];
        match self {
            Self::ComputeOnly { duration } => {
                for q in queues.iter_mut().take(tasks) {
                    q.push(TaskEvent::compute(*duration));
                }
            }
            Self::AllToAll { bytes } => {
                for i in 0..tasks {
                    for j in 1..tasks {
                        queues[i].push(TaskEvent::send((i + j) % tasks, *bytes, 0));
                    }
                    for j in 1..tasks {
                        queues[i].push(TaskEvent::recv((i + tasks - j) % tasks, *bytes, 0));
                    }
                }
            }
            Self::Ring {
                bytes,
                rounds,
                compute,
            } => {
                for i in 0..tasks {
                    for r in 0..u64::from(*rounds) {
                        if *compute > 0.0 {
                            queues[i].push(TaskEvent::compute(*compute));
                        }
                        if tasks > 1 {
                            queues[i].push(TaskEvent::send((i + 1) % tasks, *bytes, r));
                            queues[i].push(TaskEvent::recv((i + tasks - 1) % tasks, *bytes, r));
                        }
                    }
                }
            }
            Self::RandomPairs { bytes, messages } => {
                if tasks > 1 {
                    let mut recvs: Vec<Vec<TaskEvent>> = vec![Vec::new(); tasks];
                    for i in 0..tasks {
                        for m in 0..u64::from(*messages) {
                            let mut dst = rng.gen_range(0..tasks - 1);
                            if dst >= i {
                                dst += 1;
                            }
                            queues[i].push(TaskEvent::send(dst, *bytes, m));
                            recvs[dst].push(TaskEvent::recv(i, *bytes, m));
                        }
                    }
                    for (q, r) in queues.iter_mut().zip(recvs) {
                        q.extend(r);
                    }
                }
            }
            Self::StorageIo { bytes, class } => {
                if !class.is_storage() {
                    return Err(SimError::Workload(
                        "storage_io kernel needs a storage traffic class".into(),
                    ));
                }
                if storage == 0 {
                    return Err(SimError::Workload(
                        "storage_io kernel needs at least one storage node".into(),
                    ));
                }
                for i in 0..tasks {
                    let node = tasks + i % storage;
                    let tag = i as u64;
                    if class.is_read() {
                        queues[node].push(TaskEvent::send(i, *bytes, tag).with_class(*class));
                        queues[i].push(TaskEvent::recv(node, *bytes, tag).with_class(*class));
                    } else {
                        queues[i].push(TaskEvent::send(node, *bytes, tag).with_class(*class));
                        queues[node].push(TaskEvent::recv(i, *bytes, tag).with_class(*class));
                    }
                }
            }
            Self::Explicit { tasks: explicit } => {
                if explicit.len() > queues.len() {
                    return Err(SimError::Workload(format!(
                        "explicit kernel lists {} participants, application has {}",
                        explicit.len(),
                        queues.len()
                    )));
                }
                for (q, events) in queues.iter_mut().zip(explicit) {
                    q.clone_from(events);
                }
            }
        }
        validate(&queues)?;
        Ok(queues)
    }
}

/// 对端下标合法，且每个 `(发送方, 接收方, tag)` 的 Send 与 Recv 数量相等
pub fn validate(queues: &[Vec<TaskEvent>]) -> Result<()> {
    let n = queues.len();
    let mut balance: HashMap<(usize, usize, u64), i64> = HashMap::new();
    for (i, q) in queues.iter().enumerate() {
        for ev in q {
            if let Some(p) = ev.partner() {
                if p >= n || p == i {
                    return Err(SimError::Workload(format!(
                        "participant {i} has event with invalid partner {p}"
                    )));
                }
            }
            match *ev {
                TaskEvent::Send { to, tag, .. } => *balance.entry((i, to, tag)).or_insert(0) += 1,
                TaskEvent::Recv { from, tag, .. } => {
                    *balance.entry((from, i, tag)).or_insert(0) -= 1
                }
                TaskEvent::Compute { duration } if !duration.is_finite() || duration < 0.0 => {
                    return Err(SimError::Workload(format!(
                        "participant {i} has compute with invalid duration {duration}"
                    )));
                }
                TaskEvent::Compute { .. } => {}
            }
        }
    }
    if let Some((&(from, to, tag), _)) = balance.iter().find(|(_, v)| **v != 0) {
        return Err(SimError::Workload(format!(
            "unmatched send/recv between {from} and {to} with tag {tag}"
        )));
    }
    Ok(())
}
