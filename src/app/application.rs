//! 应用（作业）描述与运行期状态

use super::kernel::TrafficKernel;
use super::task::TaskState;
use crate::net::AppId;
use crate::sched::{Allocation, AllocationStrategy, CoreId, MappingStrategy, StorageStrategy};
use crate::sim::AppMetrics;

#[derive(Debug)]
pub struct Application {
    pub id: AppId,
    pub arrival: f64,
    pub tasks: usize,
    pub storage: usize,
    pub allocation: AllocationStrategy,
    pub mapping: MappingStrategy,
    pub storage_strategy: StorageStrategy,
    pub kernel: Box<dyn TrafficKernel>,

    /// 任务在前、存储节点在后
    pub participants: Vec<TaskState>,
    pub placement: Allocation,
    pub storage_slots: Vec<CoreId>,
    /// 逻辑 id -> 核心/存储槽
    pub translation: Vec<CoreId>,
    pub metrics: AppMetrics,
}

impl Application {
    pub fn new(id: AppId, arrival: f64, tasks: usize, kernel: Box<dyn TrafficKernel>) -> Self {
        Self {
            id,
            arrival,
            tasks,
            storage: 0,
            allocation: AllocationStrategy::default(),
            mapping: MappingStrategy::default(),
            storage_strategy: StorageStrategy::default(),
            kernel,
            participants: Vec::new(),
            placement: Allocation::default(),
            storage_slots: Vec::new(),
            translation: Vec::new(),
            metrics: AppMetrics {
                id,
                tasks,
                arrival,
                ..AppMetrics::default()
            },
        }
    }

    pub fn with_storage(mut self, storage: usize, strategy: StorageStrategy) -> Self {
        self.storage = storage;
        self.storage_strategy = strategy;
        self
    }

    pub fn with_allocation(mut self, strategy: AllocationStrategy) -> Self {
        self.allocation = strategy;
        self
    }

    pub fn with_mapping(mut self, strategy: MappingStrategy) -> Self {
        self.mapping = strategy;
        self
    }

    pub fn participants_len(&self) -> usize {
        self.tasks + self.storage
    }

    pub fn is_finished(&self) -> bool {
        self.participants.iter().all(|t| t.finished)
    }
}
