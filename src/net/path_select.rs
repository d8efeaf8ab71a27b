//! 注入时的路径选择
//!
//! 每个 `(源交换机, 目的服务器)` 一个轮询游标。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::id::AppId;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PathPolicy {
    /// 简单轮询
    #[default]
    RoundRobin,
    /// 从游标开始找第一条“首跳不被其他应用占多数”的路径，找不到时退回游标处
    Adaptive,
}

#[derive(Debug, Clone, Default)]
pub struct PathSelector {
    policy: PathPolicy,
    cursors: HashMap<(usize, usize), usize>,
}

impl PathSelector {
    pub fn new(policy: PathPolicy) -> Self {
        Self {
            policy,
            cursors: HashMap::new(),
        }
    }

    pub fn policy(&self) -> PathPolicy {
        self.policy
    }

    /// 在 `candidates` 条路径里选一条，返回下标并推进游标。
    ///
    /// `first_hop_owner(i)` 返回第 i 条路径首跳链路上的多数流持有者。
    pub fn select(
        &mut self,
        app: AppId,
        src_switch: usize,
        dst_server: usize,
        candidates: usize,
        first_hop_owner: impl Fn(usize) -> Option<AppId>,
    ) -> Option<usize> {
        if candidates == 0 {
            return None;
        }
        let cursor = self.cursors.entry((src_switch, dst_server)).or_insert(0);
        let start = *cursor % candidates;

        let picked = match self.policy {
            PathPolicy::RoundRobin => start,
            PathPolicy::Adaptive => (0..candidates)
                .map(|off| (start + off) % candidates)
                .find(|&i| first_hop_owner(i).is_none_or(|owner| owner == app))
                .unwrap_or(start),
        };
        *cursor = (picked + 1) % candidates;
        Some(picked)
    }
}
