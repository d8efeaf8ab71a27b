//! K 条无环最短路（Yen 算法）
//!
//! 图是交换机之间的无权图，`adj[u]` 为 `u` 的邻居交换机列表（顺序即端口顺序）。
//! 搜索过程中对节点/边的临时屏蔽全部记录在 [`KspScratch`] 里，结束前恢复，
//! 不会修改调用方的图。

use std::collections::VecDeque;

/// 交换机序列，首尾为起点和终点
pub type SwitchPath = Vec<usize>;

/// 候选路径的接受规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathLimit {
    /// 最多 `k` 条，按长度递增
    Shortest { k: usize },
    /// 只要与最短路等长的路径，最多 `k` 条
    EqualCost { k: usize },
    /// 长度不超过 `threshold` 的路径随便收，最多 `k` 条；
    /// 超过门限的只有在已有路径少于 `ths` 时才收
    Bounded { k: usize, threshold: usize, ths: usize },
}

impl PathLimit {
    fn max_paths(self) -> usize {
        match self {
            Self::Shortest { k } | Self::EqualCost { k } | Self::Bounded { k, .. } => k,
        }
    }

    /// `found` 为已选路径数，`shortest` 为最短路跳数
    fn accepts(self, hops: usize, shortest: usize, found: usize) -> bool {
        match self {
            Self::Shortest { .. } => true,
            Self::EqualCost { .. } => hops == shortest,
            Self::Bounded { threshold, ths, .. } => hops <= threshold || found < ths,
        }
    }
}

/// 可复用的搜索缓冲区
#[derive(Debug, Default)]
pub struct KspScratch {
    node_active: Vec<bool>,
    edge_active: Vec<Vec<bool>>,
    prev: Vec<usize>,
    seen: Vec<bool>,
    queue: VecDeque<usize>,
    blocked_edges: Vec<(usize, usize)>,
}

impl KspScratch {
    pub fn new(adj: &[Vec<usize>]) -> Self {
        let mut s = Self::default();
        s.reset(adj);
        s
    }

    fn reset(&mut self, adj: &[Vec<usize>]) {
        let n = adj.len();
        if self.node_active.len() != n {
            self.node_active = vec![true; n];
            self.edge_active = adj.iter().map(|nbrs| vec![true; nbrs.len()]).collect();
            self.prev = vec![usize::MAX; n];
            self.seen = vec![false; n];
        }
    }

    fn block_edge(&mut self, adj: &[Vec<usize>], u: usize, v: usize) {
        if let Some(i) = adj[u].iter().position(|&x| x == v) {
            if self.edge_active[u][i] {
                self.edge_active[u][i] = false;
                self.blocked_edges.push((u, i));
            }
        }
    }

    fn restore(&mut self, root: &[usize]) {
        for (u, i) in self.blocked_edges.drain(..) {
            self.edge_active[u][i] = true;
        }
        for &u in root {
            self.node_active[u] = true;
        }
    }

    /// 在当前屏蔽状态下 BFS，返回 `from -> to` 的一条最短路
    fn bfs(&mut self, adj: &[Vec<usize>], from: usize, to: usize) -> Option<SwitchPath> {
        self.seen.fill(false);
        self.queue.clear();
        self.seen[from] = true;
        self.queue.push_back(from);

        while let Some(u) = self.queue.pop_front() {
            if u == to {
                break;
            }
            for (i, &v) in adj[u].iter().enumerate() {
                if !self.edge_active[u][i] || !self.node_active[v] || self.seen[v] {
                    continue;
                }
                self.seen[v] = true;
                self.prev[v] = u;
                self.queue.push_back(v);
            }
        }

        if !self.seen[to] {
            return None;
        }
        let mut path = vec![to];
        let mut cur = to;
        while cur != from {
            cur = self.prev[cur];
            path.push(cur);
        }
        path.reverse();
        Some(path)
    }
}

/// 单源 BFS 跳数，不可达为 `u32::MAX`
pub fn bfs_distances(adj: &[Vec<usize>], src: usize) -> Vec<u32> {
    let mut dist = vec![u32::MAX; adj.len()];
    let mut q = VecDeque::new();
    dist[src] = 0;
    q.push_back(src);
    while let Some(u) = q.pop_front() {
        let du = dist[u];
        for &v in &adj[u] {
            if dist[v] == u32::MAX {
                dist[v] = du.saturating_add(1);
                q.push_back(v);
            }
        }
    }
    dist
}

fn hops(path: &[usize]) -> usize {
    path.len().saturating_sub(1)
}

/// 计算 `start -> end` 的无环路径列表，按选择顺序排列。
///
/// `start == end` 时返回只含该交换机的单条路径；不可达时返回空列表。
pub fn k_shortest_paths(
    adj: &[Vec<usize>],
    start: usize,
    end: usize,
    limit: PathLimit,
    scratch: &mut KspScratch,
) -> Vec<SwitchPath> {
    scratch.reset(adj);
    if start == end {
        return vec![vec![start]];
    }
    let Some(first) = scratch.bfs(adj, start, end) else {
        return Vec::new();
    };
    let shortest = hops(&first);
    let max_paths = limit.max_paths();

    let mut chosen: Vec<SwitchPath> = vec![first];
    let mut pool: Vec<SwitchPath> = Vec::new();

    while chosen.len() < max_paths {
        let last = chosen[chosen.len() - 1].clone();

        for i in 0..last.len() - 1 {
            let spur_node = last[i];
            let root = &last[..=i];

            for p in &chosen {
                if p.len() > i + 1 && &p[..=i] == root {
                    scratch.block_edge(adj, p[i], p[i + 1]);
                }
            }
            for &u in &root[..i] {
                scratch.node_active[u] = false;
            }

            let spur = scratch.bfs(adj, spur_node, end);
            scratch.restore(&root[..i]);

            let Some(spur) = spur else {
                continue;
            };
            let mut cand = root[..i].to_vec();
            cand.extend_from_slice(&spur);
            if !chosen.contains(&cand) && !pool.contains(&cand) {
                pool.push(cand);
            }
        }

        // 候选池里最短的一条；等长时取先入池的
        let Some(best) = pool
            .iter()
            .enumerate()
            .min_by_key(|(idx, p)| (hops(p), *idx))
            .map(|(idx, _)| idx)
        else {
            break;
        };
        if !limit.accepts(hops(&pool[best]), shortest, chosen.len()) {
            break;
        }
        chosen.push(pool.remove(best));
    }

    chosen
}
