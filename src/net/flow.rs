//! 流与路径
//!
//! 一个 `Flow` 对应一次 Send 在网络中的传输（或其拆分出的一个子流），
//! 注入时创建、剩余字节归零时销毁。

use serde::{Deserialize, Serialize};

use super::id::{AppId, FlowId, LinkId, NodeId};

/// 流量类别：普通任务间通信，或各类存储 I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficClass {
    #[default]
    Comm,
    StorageRead,
    StorageWrite,
    CacheReadFault,
    CacheWriteFault,
    SanRead,
    SanWrite,
}

impl TrafficClass {
    pub fn is_storage(self) -> bool {
        !matches!(self, Self::Comm)
    }

    /// 数据从存储节点流向任务
    pub fn is_read(self) -> bool {
        matches!(
            self,
            Self::StorageRead | Self::CacheReadFault | Self::SanRead
        )
    }

    /// 读写共享存储阵列的流，额外受阵列带宽限制
    pub fn targets_array(self) -> bool {
        matches!(self, Self::SanRead | Self::SanWrite)
    }
}

/// 路径上的一跳：节点及其出端口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hop {
    pub node: NodeId,
    pub port: usize,
}

/// 从源服务器到目的服务器的有序出端口序列
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    pub hops: Vec<Hop>,
}

impl Path {
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

/// 在途流
#[derive(Debug, Clone)]
pub struct Flow {
    pub id: FlowId,
    pub app: AppId,
    pub src_task: usize,
    pub dst_task: usize,
    /// 发送端任务内的事件序号，用于在子流全部到达时定位原 Send
    pub send_seq: u64,
    pub tag: u64,
    pub class: TrafficClass,
    pub bytes: f64,
    pub remaining: f64,
    /// 当前速率（字节 / 时间单位）
    pub speed: f64,
    pub path: Path,
    pub links: Vec<LinkId>,
    pub started: f64,
    /// 流存活期间路径上单条链路出现过的最大并发流数
    pub max_link_flows: usize,
}

impl Flow {
    /// 以当前速率传完剩余字节所需时间；速率为 0 时为 `None`
    pub fn time_left(&self) -> Option<f64> {
        (self.speed > 0.0 && self.speed.is_finite()).then(|| self.remaining / self.speed)
    }
}
