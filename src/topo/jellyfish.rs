//! Jellyfish 拓扑构建
//!
//! 交换机之间构成随机正则图，每台交换机的前 `servers_per_switch` 个端口接服务器，
//! 其余端口接其他交换机。服务器只有一个端口（0），连到所属交换机。

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{PortRef, Topology};
use crate::error::{Result, SimError};
use crate::net::NodeId;

/// 随机 pick 失败多少次后退化为穷举候选对
const RANDOM_PICK_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JellyfishOpts {
    pub switches: usize,
    pub ports_per_switch: usize,
    pub servers_per_switch: usize,
    #[serde(default)]
    pub seed: u64,
}

impl Default for JellyfishOpts {
    fn default() -> Self {
        Self {
            switches: 16,
            ports_per_switch: 8,
            servers_per_switch: 4,
            seed: 0,
        }
    }
}

impl JellyfishOpts {
    /// 交换机间度数
    pub fn degree(&self) -> usize {
        self.ports_per_switch.saturating_sub(self.servers_per_switch)
    }
}

#[derive(Debug, Clone)]
pub struct Jellyfish {
    servers_per_switch: usize,
    switches: usize,
    /// 按节点编号索引的端口表
    ports: Vec<Vec<Option<PortRef>>>,
}

impl Jellyfish {
    /// 由显式的交换机邻接表构建（用于可复现的固定图，例如测试里的环）。
    ///
    /// `adj[s]` 中的顺序决定交换机端口号：第 i 个邻居占用端口 `servers_per_switch + i`。
    pub fn from_switch_adjacency(adj: &[Vec<usize>], servers_per_switch: usize) -> Result<Self> {
        let switches = adj.len();
        if switches == 0 || servers_per_switch == 0 {
            return Err(SimError::Topology(
                "need at least one switch and one server per switch".into(),
            ));
        }
        for (s, nbrs) in adj.iter().enumerate() {
            for &t in nbrs {
                if t >= switches || t == s {
                    return Err(SimError::Topology(format!("bad edge {s} -> {t}")));
                }
                if !adj[t].contains(&s) {
                    return Err(SimError::Topology(format!("edge {s} -> {t} is not symmetric")));
                }
            }
        }

        let servers = switches * servers_per_switch;
        let mut ports: Vec<Vec<Option<PortRef>>> = Vec::with_capacity(servers + switches);
        for server in 0..servers {
            let sw = server / servers_per_switch;
            ports.push(vec![Some(PortRef {
                node: NodeId(servers + sw),
                port: server % servers_per_switch,
            })]);
        }
        for (s, nbrs) in adj.iter().enumerate() {
            let mut row = Vec::with_capacity(servers_per_switch + nbrs.len());
            for k in 0..servers_per_switch {
                row.push(Some(PortRef {
                    node: NodeId(s * servers_per_switch + k),
                    port: 0,
                }));
            }
            for &t in nbrs {
                let back = adj[t]
                    .iter()
                    .position(|&x| x == s)
                    .ok_or_else(|| SimError::Topology(format!("edge {t} -> {s} missing")))?;
                row.push(Some(PortRef {
                    node: NodeId(servers + t),
                    port: servers_per_switch + back,
                }));
            }
            ports.push(row);
        }

        Ok(Self {
            servers_per_switch,
            switches,
            ports,
        })
    }

    /// 交换机间度数最大值
    pub fn max_degree(&self) -> usize {
        (0..self.switches)
            .map(|s| self.switch_neighbors(s).len())
            .max()
            .unwrap_or(0)
    }
}

impl Topology for Jellyfish {
    fn num_servers(&self) -> usize {
        self.switches * self.servers_per_switch
    }

    fn num_switches(&self) -> usize {
        self.switches
    }

    fn servers_per_switch(&self) -> usize {
        self.servers_per_switch
    }

    fn port_count(&self, node: NodeId) -> usize {
        self.ports.get(node.0).map_or(0, Vec::len)
    }

    fn neighbor(&self, node: NodeId, port: usize) -> Option<PortRef> {
        self.ports.get(node.0)?.get(port).copied().flatten()
    }
}

/// 生成随机正则交换机图并挂上服务器。
///
/// 同一个 `seed` 总是得到同一张图。
#[tracing::instrument(skip(opts), fields(switches = opts.switches, degree = opts.degree(), seed = opts.seed))]
pub fn build_jellyfish(opts: &JellyfishOpts) -> Result<Jellyfish> {
    let n = opts.switches;
    let r = opts.degree();
    if opts.servers_per_switch == 0 || opts.ports_per_switch <= opts.servers_per_switch {
        return Err(SimError::Topology(format!(
            "ports_per_switch ({}) must exceed servers_per_switch ({})",
            opts.ports_per_switch, opts.servers_per_switch
        )));
    }
    if n <= r {
        return Err(SimError::Topology(format!(
            "a {r}-regular graph needs more than {r} switches, got {n}"
        )));
    }
    if (n * r) % 2 != 0 {
        return Err(SimError::Topology(format!(
            "switches * degree must be even ({n} * {r})"
        )));
    }

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut adj: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    let mut rewires = 0usize;

    loop {
        let open: Vec<usize> = (0..n).filter(|&s| adj[s].len() < r).collect();
        if open.is_empty() {
            break;
        }

        if let Some((a, b)) = pick_open_pair(&open, &adj, &mut rng) {
            adj[a].insert(b);
            adj[b].insert(a);
            continue;
        }

        // 卡住了：剩下的空闲端口彼此已相连（或只剩一台交换机），拆一条现有边重新接。
        rewires += 1;
        let (a, b) = match open.iter().copied().find(|&s| r - adj[s].len() >= 2) {
            Some(p) => (p, p),
            None if open.len() >= 2 => (open[0], open[1]),
            None => {
                return Err(SimError::Topology(
                    "cannot complete random regular graph".into(),
                ));
            }
        };
        let edges: Vec<(usize, usize)> = (0..n)
            .flat_map(|x| adj[x].iter().map(move |&y| (x, y)))
            .filter(|&(x, y)| {
                x != a && x != b && y != a && y != b && !adj[a].contains(&x) && !adj[b].contains(&y)
            })
            .collect();
        let Some(&(x, y)) = edges.choose(&mut rng) else {
            return Err(SimError::Topology(
                "cannot complete random regular graph".into(),
            ));
        };
        adj[x].remove(&y);
        adj[y].remove(&x);
        adj[a].insert(x);
        adj[x].insert(a);
        adj[b].insert(y);
        adj[y].insert(b);
    }

    debug!(rewires, "随机正则图生成完成");
    let adj: Vec<Vec<usize>> = adj.into_iter().map(|s| s.into_iter().collect()).collect();
    let topo = Jellyfish::from_switch_adjacency(&adj, opts.servers_per_switch)?;
    info!(
        servers = topo.num_servers(),
        switches = topo.num_switches(),
        "🪼 jellyfish 拓扑构建完成"
    );
    Ok(topo)
}

fn pick_open_pair(
    open: &[usize],
    adj: &[BTreeSet<usize>],
    rng: &mut StdRng,
) -> Option<(usize, usize)> {
    if open.len() < 2 {
        return None;
    }
    for _ in 0..RANDOM_PICK_ATTEMPTS {
        let a = *open.choose(rng)?;
        let b = *open.choose(rng)?;
        if a != b && !adj[a].contains(&b) {
            return Some((a, b));
        }
    }
    let mut pairs = Vec::new();
    for (i, &a) in open.iter().enumerate() {
        for &b in &open[i + 1..] {
            if !adj[a].contains(&b) {
                pairs.push((a, b));
            }
        }
    }
    pairs.choose(rng).copied()
}
