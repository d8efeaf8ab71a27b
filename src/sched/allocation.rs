//! 核心分配策略
//!
//! 所有策略先选出核心、成功后才提交，失败时不改动集群状态。

use std::collections::HashSet;

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cluster::{Cluster, CoreId};
use crate::error::{Result, SimError};
use crate::net::{AppId, RoutingTable};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// 按核心下标顺序取前 N 个空闲核心
    #[default]
    Sequential,
    /// 随机抽 (server, core)，冲突重抽
    Random,
    /// 按交换机交错的服务器顺序每轮每台服务器取一个核心
    Spread,
    /// 打乱交换机顺序，逐台交换机装满
    RandomSwitch,
    /// 预留整台交换机，不用的核心记为 inactive
    Contiguous,
    /// 从空闲核心最多的交换机出发，按跳数半径向外取核心
    Locality,
}

impl AllocationStrategy {
    pub fn parse(raw: &str) -> Result<Self> {
        let compact: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-')
            .collect();
        match compact.as_str() {
            "sequential" | "simple" => Ok(Self::Sequential),
            "random" => Ok(Self::Random),
            "spread" => Ok(Self::Spread),
            "randomswitch" => Ok(Self::RandomSwitch),
            "contiguous" => Ok(Self::Contiguous),
            "locality" => Ok(Self::Locality),
            _ => Err(SimError::UnknownSelector {
                kind: "allocation",
                value: raw.to_string(),
            }),
        }
    }
}

/// 一次成功分配的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    /// 按任务顺序排列的核心
    pub cores: Vec<CoreId>,
    /// 被预留但不运行任务的核心
    pub inactive: Vec<CoreId>,
    /// 被整体预留的交换机
    pub switches: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationOutcome {
    Placed(Allocation),
    /// 暂时放不下，等资源释放
    Blocked,
}

/// 能否进入分配：空闲核心数不少于任务数
pub fn admit(cluster: &Cluster, tasks: usize) -> bool {
    cluster.free_cores() >= tasks
}

/// 为 `app` 的 `tasks` 个任务分配核心。
///
/// 连空集群都放不下时返回配置错误；否则放不下返回 `Blocked`。
#[tracing::instrument(skip(cluster, routing, rng))]
pub fn allocate(
    strategy: AllocationStrategy,
    cluster: &mut Cluster,
    routing: &RoutingTable,
    app: AppId,
    tasks: usize,
    rng: &mut StdRng,
) -> Result<AllocationOutcome> {
    if tasks > cluster.total_cores() {
        return Err(SimError::ApplicationTooLarge {
            app,
            tasks,
            total: cluster.total_cores(),
        });
    }

    let picked = if admit(cluster, tasks) {
        match strategy {
            AllocationStrategy::Sequential => sequential(cluster, tasks),
            AllocationStrategy::Random => random(cluster, tasks, rng),
            AllocationStrategy::Spread => spread(cluster, tasks),
            AllocationStrategy::RandomSwitch => random_switch(cluster, tasks, rng),
            AllocationStrategy::Contiguous => contiguous(cluster, routing, tasks),
            AllocationStrategy::Locality => locality(cluster, routing, tasks),
        }
    } else {
        None
    };

    let Some(alloc) = picked else {
        if cluster.is_idle() {
            return Err(SimError::ApplicationTooLarge {
                app,
                tasks,
                total: cluster.total_cores(),
            });
        }
        debug!(free = cluster.free_cores(), "资源不足，阻塞调度");
        return Ok(AllocationOutcome::Blocked);
    };

    for &core in &alloc.cores {
        cluster.occupy(core, app, true);
    }
    for &core in &alloc.inactive {
        cluster.occupy(core, app, false);
    }
    for &sw in &alloc.switches {
        cluster.set_switch_reserved(sw, true);
    }
    debug!(
        cores = alloc.cores.len(),
        inactive = alloc.inactive.len(),
        free = cluster.free_cores(),
        "分配完成"
    );
    Ok(AllocationOutcome::Placed(alloc))
}

/// 归还分配；活跃核心与 inactive 核心分别释放
pub fn release(cluster: &mut Cluster, alloc: &Allocation) {
    for &core in &alloc.cores {
        cluster.release(core, true);
    }
    release_inactive(cluster, alloc);
}

pub fn release_inactive(cluster: &mut Cluster, alloc: &Allocation) {
    for &core in &alloc.inactive {
        cluster.release(core, false);
    }
    for &sw in &alloc.switches {
        cluster.set_switch_reserved(sw, false);
    }
}

fn placed(cores: Vec<CoreId>) -> Option<Allocation> {
    Some(Allocation {
        cores,
        ..Allocation::default()
    })
}

fn sequential(cluster: &Cluster, tasks: usize) -> Option<Allocation> {
    let cores: Vec<CoreId> = (0..cluster.total_cores())
        .filter(|&c| cluster.is_core_free(c))
        .take(tasks)
        .collect();
    if cores.len() == tasks {
        placed(cores)
    } else {
        None
    }
}

fn random(cluster: &Cluster, tasks: usize, rng: &mut StdRng) -> Option<Allocation> {
    if cluster.free_cores() < tasks {
        return None;
    }
    let servers = cluster.num_servers();
    let cps = cluster.cores_per_server();
    let mut chosen = HashSet::with_capacity(tasks);
    let mut cores = Vec::with_capacity(tasks);
    while cores.len() < tasks {
        let core = rng.gen_range(0..servers) * cps + rng.gen_range(0..cps);
        if cluster.is_core_free(core) && chosen.insert(core) {
            cores.push(core);
        }
    }
    placed(cores)
}

/// 服务器顺序：各交换机的第 0 台，再各交换机的第 1 台……
fn interleaved_servers(cluster: &Cluster) -> Vec<usize> {
    let sps = cluster.servers_per_switch();
    let switches = cluster.num_servers().div_ceil(sps);
    let mut order = Vec::with_capacity(cluster.num_servers());
    for k in 0..sps {
        for sw in 0..switches {
            let s = sw * sps + k;
            if s < cluster.num_servers() {
                order.push(s);
            }
        }
    }
    order
}

fn spread(cluster: &Cluster, tasks: usize) -> Option<Allocation> {
    let order = interleaved_servers(cluster);
    let cps = cluster.cores_per_server();
    let mut next = vec![0usize; cluster.num_servers()];
    let mut cores = Vec::with_capacity(tasks);
    while cores.len() < tasks {
        let before = cores.len();
        for &s in &order {
            while next[s] < cps && !cluster.is_core_free(s * cps + next[s]) {
                next[s] += 1;
            }
            if next[s] < cps {
                cores.push(s * cps + next[s]);
                next[s] += 1;
                if cores.len() == tasks {
                    break;
                }
            }
        }
        if cores.len() == before {
            return None;
        }
    }
    placed(cores)
}

fn free_cores_of_server(cluster: &Cluster, server: usize) -> impl Iterator<Item = CoreId> + '_ {
    let cps = cluster.cores_per_server();
    (server * cps..(server + 1) * cps).filter(|&c| cluster.is_core_free(c))
}

fn random_switch(cluster: &Cluster, tasks: usize, rng: &mut StdRng) -> Option<Allocation> {
    let switches = cluster.num_servers().div_ceil(cluster.servers_per_switch());
    let mut order: Vec<usize> = (0..switches).collect();
    order.shuffle(rng);
    let cores: Vec<CoreId> = order
        .into_iter()
        .flat_map(|sw| cluster.switch_servers(sw))
        .flat_map(|s| free_cores_of_server(cluster, s))
        .take(tasks)
        .collect();
    if cores.len() == tasks {
        placed(cores)
    } else {
        None
    }
}

fn contiguous(cluster: &Cluster, routing: &RoutingTable, tasks: usize) -> Option<Allocation> {
    let cps = cluster.cores_per_server();
    let servers_needed = tasks.div_ceil(cps);
    let switches = routing.num_switches();

    for seed in 0..switches {
        if !cluster.is_switch_free(seed) {
            continue;
        }
        let mut taken = Vec::new();
        let mut servers = 0;
        for sw in routing.switches_by_distance(seed) {
            if !cluster.is_switch_free(sw) {
                continue;
            }
            taken.push(sw);
            servers += cluster.switch_servers(sw).len();
            if servers >= servers_needed {
                break;
            }
        }
        if servers < servers_needed {
            continue;
        }

        let all: Vec<CoreId> = taken
            .iter()
            .flat_map(|&sw| cluster.switch_servers(sw))
            .flat_map(|s| s * cps..(s + 1) * cps)
            .collect();
        let (cores, inactive) = all.split_at(tasks);
        return Some(Allocation {
            cores: cores.to_vec(),
            inactive: inactive.to_vec(),
            switches: taken,
        });
    }
    None
}

fn locality(cluster: &Cluster, routing: &RoutingTable, tasks: usize) -> Option<Allocation> {
    let switches = routing.num_switches();
    let free_under = |sw: usize| -> usize {
        if cluster.is_switch_reserved(sw) {
            return 0;
        }
        cluster
            .switch_servers(sw)
            .map(|s| cluster.server(s).free)
            .sum()
    };
    let seed = (0..switches).max_by_key(|&sw| (free_under(sw), std::cmp::Reverse(sw)))?;
    let cores: Vec<CoreId> = routing
        .switches_by_distance(seed)
        .into_iter()
        .filter(|&sw| !cluster.is_switch_reserved(sw))
        .flat_map(|sw| cluster.switch_servers(sw))
        .flat_map(|s| free_cores_of_server(cluster, s))
        .take(tasks)
        .collect();
    if cores.len() == tasks {
        placed(cores)
    } else {
        None
    }
}
