//! 网络
//!
//! 持有拓扑、路由表、路径选择器和逐链路状态。
//! 只有路径选择（注入）与流退役会修改链路状态。

use tracing::{debug, trace};

use super::flow::{Flow, Hop, Path};
use super::id::{AppId, LinkId, NodeId};
use super::ksp::SwitchPath;
use super::link::LinkState;
use super::path_select::{PathPolicy, PathSelector};
use super::routing::{RoutingMode, RoutingTable};
use crate::topo::Topology;

pub struct Network {
    topo: Box<dyn Topology>,
    routing: RoutingTable,
    selector: PathSelector,
    /// `port_offset[node] + port` 即该出端口的 `LinkId`
    port_offset: Vec<usize>,
    links: Vec<LinkState>,
}

impl Network {
    pub fn new(topo: Box<dyn Topology>, mode: RoutingMode, policy: PathPolicy) -> Self {
        let routing = RoutingTable::build(topo.as_ref(), mode);
        let mut port_offset = Vec::with_capacity(topo.num_nodes());
        let mut total = 0;
        for node in 0..topo.num_nodes() {
            port_offset.push(total);
            total += topo.port_count(NodeId(node));
        }
        debug!(links = total, "链路表初始化");
        Self {
            topo,
            routing,
            selector: PathSelector::new(policy),
            port_offset,
            links: vec![LinkState::default(); total],
        }
    }

    pub fn topology(&self) -> &dyn Topology {
        self.topo.as_ref()
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn links(&self) -> &[LinkState] {
        &self.links
    }

    pub fn link_id(&self, node: NodeId, port: usize) -> LinkId {
        LinkId(self.port_offset[node.0] + port)
    }

    pub fn link(&self, id: LinkId) -> &LinkState {
        &self.links[id.0]
    }

    /// 两台服务器之间的交换机跳数
    pub fn server_distance(&self, src: usize, dst: usize) -> Option<usize> {
        self.routing
            .distance(self.topo.server_switch(src), self.topo.server_switch(dst))
    }

    /// 为 `app` 选一条 `src -> dst` 服务器路径；同一服务器返回空路径，无路可走返回 `None`。
    #[tracing::instrument(skip(self), level = "trace")]
    pub fn route(&mut self, app: AppId, src: usize, dst: usize) -> Option<Path> {
        if src == dst {
            return Some(Path::default());
        }
        let a = self.topo.server_switch(src);
        let b = self.topo.server_switch(dst);
        let candidates = self.routing.paths(a, b);

        let topo = self.topo.as_ref();
        let routing = &self.routing;
        let links = &self.links;
        let port_offset = &self.port_offset;
        let idx = self
            .selector
            .select(app, a, dst, candidates.len(), |i| {
                let p = &candidates[i];
                if p.len() < 2 {
                    return None;
                }
                let port = routing.egress_port(p[0], p[1])?;
                let node = topo.switch_node(p[0]);
                links[port_offset[node.0] + port].majority_holder()
            })?;

        let path = build_path(topo, routing, &candidates[idx], src, dst);
        trace!(hops = ?path.as_ref().map(Path::len), "选中路径");
        path
    }

    /// 路径对应的链路
    pub fn path_links(&self, path: &Path) -> Vec<LinkId> {
        path.hops
            .iter()
            .map(|h| self.link_id(h.node, h.port))
            .collect()
    }

    pub fn attach(&mut self, flow: &Flow) {
        for l in &flow.links {
            self.links[l.0].attach(flow.id, flow.app, flow.class);
        }
    }

    pub fn detach(&mut self, flow: &Flow) {
        for l in &flow.links {
            let removed = self.links[l.0].detach(flow.id, flow.app, flow.class);
            debug_assert!(removed, "flow {:?} missing from link {:?}", flow.id, l);
        }
    }

    /// 记录一步内流经链路的字节数（用于利用率统计）
    pub fn account(&mut self, links: &[LinkId], bytes: f64) {
        for l in links {
            self.links[l.0].bytes_carried += bytes;
        }
    }

    /// 链路共享直方图：下标为曾使用该链路的应用数，值为链路数。只统计已连接的端口。
    pub fn sharing_histogram(&self) -> Vec<usize> {
        let mut hist = vec![0usize; 1];
        for node in 0..self.topo.num_nodes() {
            let node = NodeId(node);
            for port in 0..self.topo.port_count(node) {
                if self.topo.neighbor(node, port).is_none() {
                    continue;
                }
                let apps = self.links[self.link_id(node, port).0].apps_seen.len();
                if hist.len() <= apps {
                    hist.resize(apps + 1, 0);
                }
                hist[apps] += 1;
            }
        }
        hist
    }

    /// 承载过流量的链路的平均利用率
    pub fn utilization(&self, bandwidth: f64, makespan: f64) -> f64 {
        let used: Vec<&LinkState> = self.links.iter().filter(|l| l.bytes_carried > 0.0).collect();
        if used.is_empty() || makespan <= 0.0 || bandwidth <= 0.0 {
            return 0.0;
        }
        let carried: f64 = used.iter().map(|l| l.bytes_carried).sum();
        carried / (bandwidth * makespan * used.len() as f64)
    }
}

/// 把交换机序列展开为服务器到服务器的 `(node, port)` 跳序列
fn build_path(
    topo: &dyn Topology,
    routing: &RoutingTable,
    switches: &SwitchPath,
    src: usize,
    dst: usize,
) -> Option<Path> {
    let mut hops = Vec::with_capacity(switches.len() + 1);
    hops.push(Hop {
        node: NodeId(src),
        port: 0,
    });
    for pair in switches.windows(2) {
        hops.push(Hop {
            node: topo.switch_node(pair[0]),
            port: routing.egress_port(pair[0], pair[1])?,
        });
    }
    let last = topo.switch_node(*switches.last()?);
    let down = (0..topo.port_count(last))
        .find(|&p| topo.neighbor(last, p).is_some_and(|peer| peer.node == NodeId(dst)))?;
    hops.push(Hop {
        node: last,
        port: down,
    });
    Some(Path { hops })
}
