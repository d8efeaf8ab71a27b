//! 调度模块
//!
//! 集群核心状态、分配策略、存储放置、映射层以及 FCFS 调度队列。
//! 只有这里会修改核心占用。

mod allocation;
mod cluster;
mod mapping;
mod scheduler;
mod storage;

pub use allocation::{
    Allocation, AllocationOutcome, AllocationStrategy, admit, allocate, release, release_inactive,
};
pub use cluster::{Cluster, CoreId, ServerState};
pub use mapping::{MappingStrategy, map, translate};
pub use scheduler::{Placement, Scheduler, place, release_application};
pub use storage::{StorageStrategy, allocate_storage, release_storage};
