//! 流级带宽分配
//!
//! 每次链路占用变化后重算所有在途流的瞬时速率：
//! - `Fast`：每条链路按在途流数等分，流速取路径上各链路份额的最小值；
//! - `Accurate`：渐进填充（max-min 公平），反复冻结瓶颈链路上的流并把剩余容量让给其他流。
//!
//! 两种模型都可按流量类别划分链路容量，并对访问共享存储阵列的流额外施加阵列带宽上限。

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::flow::{Flow, TrafficClass};
use super::id::{FlowId, LinkId};
use super::link::LinkState;
use crate::error::{Result, SimError};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BandwidthModel {
    #[default]
    Fast,
    Accurate,
}

impl BandwidthModel {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "accurate" | "maxmin" | "max_min" => Ok(Self::Accurate),
            _ => Err(SimError::UnknownSelector {
                kind: "bandwidth model",
                value: raw.to_string(),
            }),
        }
    }
}

/// 通信类 / 存储类
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClassGroup {
    Comm,
    Storage,
}

impl ClassGroup {
    fn of(class: TrafficClass) -> Self {
        if class.is_storage() {
            Self::Storage
        } else {
            Self::Comm
        }
    }

    fn other(self) -> Self {
        match self {
            Self::Comm => Self::Storage,
            Self::Storage => Self::Comm,
        }
    }
}

/// 链路容量在两类流量之间的划分
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrafficSplit {
    /// 不区分类别
    #[default]
    None,
    /// 固定百分比留给通信类，其余留给存储类
    Reserved { comm_percent: f64 },
    /// `favor` 类先分，另一类只分到它用剩的容量
    Priority { favor: ClassGroup },
}

/// 一次分享涉及的流：全部，或某一类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Members {
    All,
    Group(ClassGroup),
}

impl Members {
    fn admits(self, class: TrafficClass) -> bool {
        match self {
            Self::All => true,
            Self::Group(g) => ClassGroup::of(class) == g,
        }
    }

    /// 链路上属于本组的在途流数
    fn count(self, link: &LinkState) -> usize {
        match self {
            Self::All => link.active(),
            Self::Group(ClassGroup::Comm) => link.comm_flows,
            Self::Group(ClassGroup::Storage) => link.storage_flows,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BandwidthEngine {
    pub model: BandwidthModel,
    pub split: TrafficSplit,
    pub link_bandwidth: f64,
    pub array_bandwidth: Option<f64>,
}

impl BandwidthEngine {
    /// 重算 `flows` 中每条流的 `speed`。
    ///
    /// `Fast` 下已有速率只会被压低（新流以 `f64::INFINITY` 注入）；被压到 0 的流重新参与分配。
    /// `Accurate` 每次从头做渐进填充。
    #[tracing::instrument(skip(self, links, flows), fields(model = ?self.model, flows = flows.len()))]
    pub fn recompute(&self, links: &[LinkState], flows: &mut IndexMap<FlowId, Flow>) {
        for flow in flows.values_mut() {
            let busiest = flow
                .links
                .iter()
                .map(|l| links[l.0].active())
                .max()
                .unwrap_or(0);
            flow.max_link_flows = flow.max_link_flows.max(busiest);
            match self.model {
                BandwidthModel::Fast if flow.speed > 0.0 => {}
                _ => flow.speed = f64::INFINITY,
            }
        }

        let bw = self.link_bandwidth;
        match self.split {
            TrafficSplit::None => {
                self.share(links, flows, Members::All, |_| bw);
            }
            TrafficSplit::Reserved { comm_percent } => {
                let comm = bw * comm_percent.clamp(0.0, 100.0) / 100.0;
                self.share(links, flows, Members::Group(ClassGroup::Comm), |_| comm);
                self.share(links, flows, Members::Group(ClassGroup::Storage), |_| {
                    bw - comm
                });
            }
            TrafficSplit::Priority { favor } => {
                self.share(links, flows, Members::Group(favor), |_| bw);
                let mut used = vec![0.0; links.len()];
                for flow in flows.values().filter(|f| ClassGroup::of(f.class) == favor) {
                    for l in &flow.links {
                        used[l.0] += flow.speed;
                    }
                }
                self.share(links, flows, Members::Group(favor.other()), |l| {
                    (bw - used[l.0]).max(0.0)
                });
            }
        }

        if let Some(array_bw) = self.array_bandwidth {
            let users = flows.values().filter(|f| f.class.targets_array()).count();
            if users > 0 {
                let cap = array_bw / users as f64;
                for flow in flows.values_mut().filter(|f| f.class.targets_array()) {
                    flow.speed = flow.speed.min(cap);
                }
            }
        }

        for flow in flows.values() {
            trace!(flow = flow.id.0, speed = flow.speed, "流速更新");
        }
    }

    fn share(
        &self,
        links: &[LinkState],
        flows: &mut IndexMap<FlowId, Flow>,
        members: Members,
        capacity: impl Fn(LinkId) -> f64,
    ) {
        match self.model {
            BandwidthModel::Fast => proportional_share(links, flows, members, capacity),
            BandwidthModel::Accurate => progressive_filling(links.len(), flows, members, capacity),
        }
    }
}

/// 每条链路按本组在途流数等分，流速只会被沿途链路压低
fn proportional_share(
    links: &[LinkState],
    flows: &mut IndexMap<FlowId, Flow>,
    members: Members,
    capacity: impl Fn(LinkId) -> f64,
) {
    for flow in flows.values_mut().filter(|f| members.admits(f.class)) {
        for &l in &flow.links {
            let n = members.count(&links[l.0]).max(1);
            flow.speed = flow.speed.min(capacity(l) / n as f64);
        }
    }
}

/// 渐进填充：每轮找出“剩余容量 / 未冻结流数”最小的链路，把其上未冻结的流冻结在该份额。
///
/// 冻结值不低于 `路径最小容量 / max_link_flows`：该下界不超过 max-min 解，只挡住浮点误差造成的饿死。
fn progressive_filling(
    nlinks: usize,
    flows: &mut IndexMap<FlowId, Flow>,
    members: Members,
    capacity: impl Fn(LinkId) -> f64,
) {
    let mut left = vec![0.0; nlinks];
    let mut unfrozen = vec![0usize; nlinks];
    let mut through: Vec<Vec<usize>> = vec![Vec::new(); nlinks];
    let mut frozen = vec![true; flows.len()];

    for (idx, flow) in flows.values().enumerate() {
        if !members.admits(flow.class) {
            continue;
        }
        frozen[idx] = false;
        for l in &flow.links {
            if unfrozen[l.0] == 0 {
                left[l.0] = capacity(*l);
            }
            unfrozen[l.0] += 1;
            through[l.0].push(idx);
        }
    }

    loop {
        let bottleneck = (0..nlinks)
            .filter(|&l| unfrozen[l] > 0)
            .map(|l| (l, left[l].max(0.0) / unfrozen[l] as f64))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let Some((link, share)) = bottleneck else {
            break;
        };

        for &idx in &through[link] {
            if frozen[idx] {
                continue;
            }
            frozen[idx] = true;
            let Some((_, flow)) = flows.get_index_mut(idx) else {
                continue;
            };
            let path_capacity = flow
                .links
                .iter()
                .map(|&l| capacity(l))
                .fold(f64::INFINITY, f64::min);
            let floor = path_capacity / flow.max_link_flows.max(1) as f64;
            flow.speed = share.max(floor);
            for l in &flow.links {
                left[l.0] -= flow.speed;
                unfrozen[l.0] -= 1;
            }
        }
    }
}
