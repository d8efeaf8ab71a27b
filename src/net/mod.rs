//! 网络模块
//!
//! 拓扑之上的路由表、路径选择、链路状态与流级带宽分配。

// 子模块声明
mod bandwidth;
mod flow;
mod id;
mod ksp;
mod link;
mod network;
mod path_select;
mod routing;

// 重新导出公共接口
pub use bandwidth::{BandwidthEngine, BandwidthModel, ClassGroup, TrafficSplit};
pub use flow::{Flow, Hop, Path, TrafficClass};
pub use id::{AppId, FlowId, LinkId, NodeId};
pub use ksp::{KspScratch, PathLimit, SwitchPath, bfs_distances, k_shortest_paths};
pub use link::LinkState;
pub use network::Network;
pub use path_select::{PathPolicy, PathSelector};
pub use routing::{RoutingMode, RoutingTable};
