//! 先来先服务调度队列
//!
//! 应用按 `(到达时间, 提交序号)` 排队。只尝试队首：队首放不下时后面的应用也不放，
//! 等下一次有资源释放再试。

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use tracing::{debug, info};

use super::allocation::{self, AllocationOutcome};
use super::cluster::Cluster;
use super::mapping;
use super::storage;
use crate::app::{Application, TaskState};
use crate::error::Result;
use crate::net::{AppId, RoutingTable};
use crate::sim::SimTime;

struct Queued {
    at: SimTime,
    seq: u64,
    app: AppId,
}

// BinaryHeap 是 max-heap；最早到达优先，因此反向比较。
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.at.total_cmp(&other.at) {
            Ordering::Equal => self.seq.cmp(&other.seq),
            ord => ord,
        }
        .reverse()
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

/// 一次调度尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Placed(AppId),
    /// 队首已到达但资源不足
    Blocked,
    /// 队列为空或队首尚未到达
    Idle,
}

#[derive(Default)]
pub struct Scheduler {
    queue: BinaryHeap<Queued>,
    next_seq: u64,
}

impl Scheduler {
    pub fn submit(&mut self, at: SimTime, app: AppId) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Queued { at, seq, app });
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// 队首应用的到达时间
    pub fn next_arrival(&self) -> Option<SimTime> {
        self.queue.peek().map(|q| q.at)
    }

    /// 队首已到达时尝试放置它。
    ///
    /// `apps` 以 `AppId` 为下标。放置成功的应用已完成核心分配、存储放置、
    /// 映射和事件生成。
    #[tracing::instrument(skip(self, cluster, routing, apps, rng), level = "debug")]
    pub fn place_head(
        &mut self,
        now: SimTime,
        cluster: &mut Cluster,
        routing: &RoutingTable,
        apps: &mut [Application],
        rng: &mut StdRng,
    ) -> Result<Placement> {
        let Some(head) = self.queue.peek() else {
            return Ok(Placement::Idle);
        };
        if head.at > now {
            return Ok(Placement::Idle);
        }
        let Some(head) = self.queue.pop() else {
            return Ok(Placement::Idle);
        };

        let app = &mut apps[head.app.0];
        if place(app, cluster, routing, rng)? {
            app.metrics.start = now.secs();
            info!(app = app.id.0, tasks = app.tasks, t = now.secs(), "🚀 应用开始运行");
            Ok(Placement::Placed(head.app))
        } else {
            debug!(app = head.app.0, "队首阻塞");
            self.queue.push(head);
            Ok(Placement::Blocked)
        }
    }
}

/// 为应用分配核心与存储、建立映射并生成事件；资源不足返回 `false` 且不改动集群。
pub fn place(
    app: &mut Application,
    cluster: &mut Cluster,
    routing: &RoutingTable,
    rng: &mut StdRng,
) -> Result<bool> {
    let alloc = match allocation::allocate(app.allocation, cluster, routing, app.id, app.tasks, rng)? {
        AllocationOutcome::Placed(alloc) => alloc,
        AllocationOutcome::Blocked => return Ok(false),
    };
    let slots = match storage::allocate_storage(
        app.storage_strategy,
        cluster,
        app.id,
        app.storage,
        &alloc.cores,
        rng,
    ) {
        Ok(slots) => slots,
        Err(e) => {
            allocation::release(cluster, &alloc);
            return Err(e);
        }
    };

    let queues = match app.kernel.generate(app.tasks, app.storage, rng) {
        Ok(queues) => queues,
        Err(e) => {
            allocation::release(cluster, &alloc);
            storage::release_storage(cluster, &slots);
            return Err(e);
        }
    };
    app.translation = mapping::map(app.mapping, &alloc.cores, &slots, rng);
    app.participants = queues.into_iter().map(TaskState::new).collect();
    app.placement = alloc;
    app.storage_slots = slots;
    Ok(true)
}

/// 归还应用占用的核心、预留交换机和存储槽
pub fn release_application(app: &mut Application, cluster: &mut Cluster) {
    allocation::release(cluster, &app.placement);
    storage::release_storage(cluster, &app.storage_slots);
    app.placement = Default::default();
    app.storage_slots.clear();
    app.translation.clear();
}
