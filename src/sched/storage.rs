//! 存储节点放置
//!
//! 存储单元不占核心，只占服务器的“最后一个核心位”作为标记，
//! 返回的存储 id 即该核心位下标。

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cluster::{Cluster, CoreId};
use crate::error::{Result, SimError};
use crate::net::AppId;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageStrategy {
    /// 在所有服务器中无放回随机抽取
    #[default]
    Remote,
    /// 只在运行本应用任务的服务器中无放回随机抽取
    Local,
    /// 全局轮询，不避免冲突
    Cache,
}

impl StorageStrategy {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            "cache" => Ok(Self::Cache),
            _ => Err(SimError::UnknownSelector {
                kind: "storage",
                value: raw.to_string(),
            }),
        }
    }
}

pub fn allocate_storage(
    strategy: StorageStrategy,
    cluster: &mut Cluster,
    app: AppId,
    count: usize,
    task_cores: &[CoreId],
    rng: &mut StdRng,
) -> Result<Vec<CoreId>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let servers: Vec<usize> = match strategy {
        StorageStrategy::Remote => {
            let all: Vec<usize> = (0..cluster.num_servers()).collect();
            sample(app, &all, count, rng)?
        }
        StorageStrategy::Local => {
            let mut hosts: Vec<usize> = Vec::new();
            for &core in task_cores {
                let s = cluster.server_of(core);
                if !hosts.contains(&s) {
                    hosts.push(s);
                }
            }
            sample(app, &hosts, count, rng)?
        }
        StorageStrategy::Cache => {
            let n = cluster.num_servers();
            (0..count)
                .map(|_| {
                    let s = cluster.storage_cursor % n;
                    cluster.storage_cursor = cluster.storage_cursor.wrapping_add(1);
                    s
                })
                .collect()
        }
    };

    let slots = servers
        .into_iter()
        .map(|s| {
            cluster.add_storage(s);
            cluster.storage_slot(s)
        })
        .collect::<Vec<_>>();
    debug!(?strategy, ?slots, "存储节点放置完成");
    Ok(slots)
}

pub fn release_storage(cluster: &mut Cluster, storage: &[CoreId]) {
    for &slot in storage {
        let s = cluster.server_of(slot);
        cluster.remove_storage(s);
    }
}

fn sample(app: AppId, from: &[usize], count: usize, rng: &mut StdRng) -> Result<Vec<usize>> {
    if count > from.len() {
        return Err(SimError::StoragePlacement {
            app,
            reason: format!(
                "{count} storage nodes requested but only {} candidate servers",
                from.len()
            ),
        });
    }
    Ok(from.choose_multiple(rng, count).copied().collect())
}
