//! 路由表（K 最短路 / LLSKR / ECMP）
//!
//! 为每个有序交换机对 `(src, dst)`（包含 `src == dst`，即源和目的服务器挂在同一台交换机上）
//! 预计算一组无环路径。路由表构建后只读，由所有流共享。

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::ksp::{KspScratch, PathLimit, SwitchPath, bfs_distances, k_shortest_paths};
use crate::error::{Result, SimError};
use crate::topo::Topology;

/// 路由表构建方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingMode {
    /// Yen K 最短路
    Ksp { k: usize },
    /// 低时延 K 最短路：长度门限内的路径优先，不足 `ths` 条时才放宽
    Llskr { k: usize, ths: usize },
    /// 全部等长最短路
    Ecmp,
}

impl Default for RoutingMode {
    fn default() -> Self {
        Self::Ksp { k: 4 }
    }
}

impl RoutingMode {
    /// 解析命令行写法：`ksp:4`、`llskr:8:2`、`ecmp`
    pub fn parse(raw: &str) -> Result<Self> {
        let unknown = || SimError::UnknownSelector {
            kind: "routing",
            value: raw.to_string(),
        };
        let normalized = raw.trim().to_lowercase();
        let mut parts = normalized.split(':');
        let head = parts.next().unwrap_or_default();
        let mut num = |default: usize| -> Result<usize> {
            match parts.next() {
                None => Ok(default),
                Some(v) => v.parse().map_err(|_| unknown()),
            }
        };
        let mode = match head {
            "ksp" => Self::Ksp { k: num(4)? },
            "llskr" => {
                let k = num(8)?;
                let ths = num(2)?;
                Self::Llskr { k, ths }
            }
            "ecmp" => Self::Ecmp,
            _ => return Err(unknown()),
        };
        Ok(mode)
    }
}

#[derive(Debug, Clone)]
pub struct RoutingTable {
    switches: usize,
    /// `adj[s]`：`(邻居交换机, 本端出端口)`
    adj: Vec<Vec<(usize, usize)>>,
    /// 扁平化的 `switches * switches` 跳数矩阵
    dist: Vec<u32>,
    /// `paths[src * switches + dst]`
    paths: Vec<Vec<SwitchPath>>,
}

impl RoutingTable {
    #[tracing::instrument(skip(topo))]
    pub fn build(topo: &dyn Topology, mode: RoutingMode) -> Self {
        let n = topo.num_switches();
        let adj: Vec<Vec<(usize, usize)>> = (0..n).map(|s| topo.switch_neighbors(s)).collect();
        let plain: Vec<Vec<usize>> = adj
            .iter()
            .map(|nbrs| nbrs.iter().map(|&(v, _)| v).collect())
            .collect();

        let mut dist = Vec::with_capacity(n * n);
        for s in 0..n {
            dist.extend(bfs_distances(&plain, s));
        }

        let limit = match mode {
            RoutingMode::Ksp { k } => PathLimit::Shortest { k: k.max(1) },
            RoutingMode::Ecmp => PathLimit::EqualCost { k: n.max(1) },
            RoutingMode::Llskr { k, ths } => PathLimit::Bounded {
                k: k.max(1),
                threshold: llskr_threshold(&plain),
                ths,
            },
        };
        debug!(?limit, "路径接受规则");

        let mut scratch = KspScratch::new(&plain);
        let mut paths = Vec::with_capacity(n * n);
        let mut total = 0usize;
        for s in 0..n {
            for d in 0..n {
                let ps = k_shortest_paths(&plain, s, d, limit, &mut scratch);
                total += ps.len();
                paths.push(ps);
            }
        }
        info!(switches = n, total_paths = total, "🧭 路由表构建完成");

        Self {
            switches: n,
            adj,
            dist,
            paths,
        }
    }

    pub fn num_switches(&self) -> usize {
        self.switches
    }

    /// 交换机间跳数，不可达为 `None`
    pub fn distance(&self, a: usize, b: usize) -> Option<usize> {
        let d = self.dist[a * self.switches + b];
        (d != u32::MAX).then_some(d as usize)
    }

    pub fn paths(&self, src: usize, dst: usize) -> &[SwitchPath] {
        &self.paths[src * self.switches + dst]
    }

    /// `from -> to` 直连链路在 `from` 上的出端口
    pub fn egress_port(&self, from: usize, to: usize) -> Option<usize> {
        self.adj[from]
            .iter()
            .find(|&&(v, _)| v == to)
            .map(|&(_, port)| port)
    }

    /// 按与 `seed` 的距离（再按下标）排序的可达交换机
    pub fn switches_by_distance(&self, seed: usize) -> Vec<usize> {
        let mut order: Vec<(usize, usize)> = (0..self.switches)
            .filter_map(|s| self.distance(seed, s).map(|d| (d, s)))
            .collect();
        order.sort_unstable();
        order.into_iter().map(|(_, s)| s).collect()
    }
}

/// LLSKR 长度门限：按平均度数估算 h 跳内可达的交换机数，
/// 取能覆盖全部交换机的最小 h。
fn llskr_threshold(adj: &[Vec<usize>]) -> usize {
    let n = adj.len();
    if n <= 1 {
        return 0;
    }
    let degree = adj.iter().map(Vec::len).sum::<usize>() as f64 / n as f64;
    if degree <= 1.0 {
        return n;
    }
    let mut reach = 1.0;
    let mut frontier = degree;
    for h in 1..=n {
        reach += frontier;
        if reach >= n as f64 {
            return h;
        }
        frontier *= degree - 1.0;
    }
    n
}
