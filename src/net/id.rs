//! 标识符类型
//!
//! 定义节点、链路、流和应用的唯一标识符。

use serde::{Deserialize, Serialize};

/// 节点标识符（服务器在前，交换机在后）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// 链路标识符：`(node, port)` 出端口在扁平链路表中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(pub usize);

/// 流标识符（单个子流）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FlowId(pub u64);

/// 应用标识符
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AppId(pub usize);
