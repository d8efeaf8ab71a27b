//! 拓扑连接性
//!
//! 路由表构建和逐跳链路统计只通过 [`Topology`] 访问拓扑：
//! 每个节点暴露若干编号端口，每个端口要么连到唯一的 `(node, port)`，要么未连接。
//! 节点编号约定：服务器占 `0..num_servers`，交换机紧随其后。

pub mod jellyfish;

use crate::net::NodeId;

/// 端口的远端：对端节点及其端口号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub port: usize,
}

pub trait Topology {
    fn num_servers(&self) -> usize;

    fn num_switches(&self) -> usize;

    /// 每台交换机下挂的服务器数
    fn servers_per_switch(&self) -> usize;

    fn port_count(&self, node: NodeId) -> usize;

    /// `None` 表示端口未连接
    fn neighbor(&self, node: NodeId, port: usize) -> Option<PortRef>;

    fn num_nodes(&self) -> usize {
        self.num_servers() + self.num_switches()
    }

    fn is_switch(&self, node: NodeId) -> bool {
        node.0 >= self.num_servers()
    }

    fn switch_node(&self, switch: usize) -> NodeId {
        NodeId(self.num_servers() + switch)
    }

    fn switch_index(&self, node: NodeId) -> usize {
        debug_assert!(self.is_switch(node));
        node.0 - self.num_servers()
    }

    /// 服务器接入的交换机下标
    fn server_switch(&self, server: usize) -> usize {
        server / self.servers_per_switch()
    }

    /// 交换机之间的邻接：`(邻居交换机下标, 本端出端口)`，跳过服务器端口与未连接端口。
    fn switch_neighbors(&self, switch: usize) -> Vec<(usize, usize)> {
        let node = self.switch_node(switch);
        (0..self.port_count(node))
            .filter_map(|port| {
                let peer = self.neighbor(node, port)?;
                self.is_switch(peer.node)
                    .then(|| (self.switch_index(peer.node), port))
            })
            .collect()
    }
}
