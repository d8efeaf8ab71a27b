//! 运行配置

use serde::{Deserialize, Serialize};

use crate::net::{BandwidthModel, PathPolicy, RoutingMode, TrafficSplit};

fn default_link_bandwidth() -> f64 {
    100.0
}

fn one() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    #[serde(default)]
    pub bandwidth_model: BandwidthModel,
    #[serde(default)]
    pub traffic_split: TrafficSplit,
    /// 每条链路的容量（字节 / 时间单位）
    #[serde(default = "default_link_bandwidth")]
    pub link_bandwidth: f64,
    /// 共享存储阵列的总带宽；`None` 表示不限
    #[serde(default)]
    pub array_bandwidth: Option<f64>,
    /// 每个任务最多同时在途的 Send 数，0 表示不限
    #[serde(default)]
    pub injection_window: usize,
    /// 每条消息拆成的子流数
    #[serde(default = "one")]
    pub subflows: usize,
    #[serde(default)]
    pub routing: RoutingMode,
    #[serde(default)]
    pub path_policy: PathPolicy,
    /// 聚合带宽采样间隔
    #[serde(default)]
    pub sample_interval: Option<f64>,
    #[serde(default)]
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bandwidth_model: BandwidthModel::default(),
            traffic_split: TrafficSplit::default(),
            link_bandwidth: default_link_bandwidth(),
            array_bandwidth: None,
            injection_window: 0,
            subflows: 1,
            routing: RoutingMode::default(),
            path_policy: PathPolicy::default(),
            sample_interval: None,
            seed: 0,
        }
    }
}
