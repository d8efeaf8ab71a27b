//! 逻辑 id → 物理位置映射
//!
//! 翻译表长度为 `tasks + storage`：任务部分是分配到的核心（原序或随机排列），
//! 存储部分是存储槽。

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::cluster::CoreId;
use crate::error::{Result, SimError};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MappingStrategy {
    #[default]
    Consecutive,
    Random,
}

impl MappingStrategy {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "consecutive" | "sequential" => Ok(Self::Consecutive),
            "random" => Ok(Self::Random),
            _ => Err(SimError::UnknownSelector {
                kind: "mapping",
                value: raw.to_string(),
            }),
        }
    }
}

pub fn map(
    strategy: MappingStrategy,
    cores: &[CoreId],
    storage: &[CoreId],
    rng: &mut StdRng,
) -> Vec<CoreId> {
    let mut table = Vec::with_capacity(cores.len() + storage.len());
    table.extend_from_slice(cores);
    if strategy == MappingStrategy::Random {
        table.shuffle(rng);
    }
    table.extend_from_slice(storage);
    table
}

/// 逻辑 id 所在的服务器
pub fn translate(table: &[CoreId], logical: usize, cores_per_server: usize) -> usize {
    table[logical] / cores_per_server
}
