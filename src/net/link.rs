//! 链路状态
//!
//! 每个 `(node, port)` 出端口一条单向链路。记录在途流集合、按类别计数，
//! 以及按应用计数（用于公平性判断与利用率统计）。

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexSet;

use super::flow::TrafficClass;
use super::id::{AppId, FlowId};

#[derive(Debug, Default, Clone)]
pub struct LinkState {
    /// 以 `FlowId` 为句柄，流结束时能精确删除自己的那一条
    pub flows: IndexSet<FlowId>,
    pub comm_flows: usize,
    pub storage_flows: usize,
    pub app_flows: BTreeMap<AppId, usize>,
    /// 曾经使用过该链路的应用
    pub apps_seen: BTreeSet<AppId>,
    pub bytes_carried: f64,
}

impl LinkState {
    pub fn active(&self) -> usize {
        self.flows.len()
    }

    pub(crate) fn attach(&mut self, flow: FlowId, app: AppId, class: TrafficClass) {
        if !self.flows.insert(flow) {
            return;
        }
        if class.is_storage() {
            self.storage_flows += 1;
        } else {
            self.comm_flows += 1;
        }
        *self.app_flows.entry(app).or_insert(0) += 1;
        self.apps_seen.insert(app);
    }

    pub(crate) fn detach(&mut self, flow: FlowId, app: AppId, class: TrafficClass) -> bool {
        if !self.flows.swap_remove(&flow) {
            return false;
        }
        if class.is_storage() {
            self.storage_flows -= 1;
        } else {
            self.comm_flows -= 1;
        }
        if let Some(n) = self.app_flows.get_mut(&app) {
            *n -= 1;
            if *n == 0 {
                self.app_flows.remove(&app);
            }
        }
        true
    }

    /// 持有严格过半在途流的应用。
    ///
    /// 平票时不存在多数方。
    pub fn majority_holder(&self) -> Option<AppId> {
        let total = self.flows.len();
        self.app_flows
            .iter()
            .find(|&(_, &n)| n * 2 > total)
            .map(|(&app, _)| app)
    }
}
