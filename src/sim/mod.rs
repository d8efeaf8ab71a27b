//! 仿真核心模块
//!
//! 仿真时间、运行配置、workload 结构、指标接口以及时间步进执行引擎。

// 子模块声明
mod config;
mod engine;
mod metrics;
mod time;
mod workload;

// 重新导出公共接口
pub use config::SimConfig;
pub use engine::SimulationContext;
pub use metrics::{AppMetrics, BandwidthSample, MemorySink, MetricsSink, RunReport, RunSummary};
pub use time::SimTime;
pub use workload::{ApplicationSpec, TopologySpec, WorkloadSpec};
