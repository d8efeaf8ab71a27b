//! 指标
//!
//! 引擎只通过 [`MetricsSink`] 上报应用结束时的统计和聚合带宽采样，不做任何格式化。

use serde::Serialize;

use crate::net::AppId;

/// 单个应用的最终统计
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AppMetrics {
    pub id: AppId,
    pub tasks: usize,
    pub arrival: f64,
    pub start: f64,
    pub finish: f64,
    pub runtime: f64,
    /// 从到达到开始运行的等待时间
    pub wait: f64,
    /// 子流数
    pub flows: usize,
    pub bytes: f64,
    /// 所有子流交换机跳数之和
    pub total_distance: usize,
    pub max_distance: usize,
    pub mean_latency: f64,
    pub max_latency: f64,
    pub cpu_time: f64,
    #[serde(skip)]
    pub(crate) latency_sum: f64,
}

impl AppMetrics {
    pub(crate) fn record_flow(&mut self, bytes: f64, distance: usize, latency: f64) {
        self.flows += 1;
        self.bytes += bytes;
        self.total_distance += distance;
        self.max_distance = self.max_distance.max(distance);
        self.latency_sum += latency;
        self.max_latency = self.max_latency.max(latency);
    }

    pub(crate) fn finalize(&mut self, finish: f64, cpu_time: f64) {
        self.finish = finish;
        self.runtime = finish - self.start;
        self.wait = self.start - self.arrival;
        self.cpu_time = cpu_time;
        if self.flows > 0 {
            self.mean_latency = self.latency_sum / self.flows as f64;
        }
    }

    pub fn mean_distance(&self) -> f64 {
        if self.flows == 0 {
            0.0
        } else {
            self.total_distance as f64 / self.flows as f64
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct BandwidthSample {
    pub time: f64,
    /// 所有在途流速率之和
    pub bandwidth: f64,
}

pub trait MetricsSink {
    fn record(&mut self, metrics: AppMetrics);

    fn record_sample(&mut self, time: f64, bandwidth: f64);
}

/// 全部留在内存里
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub apps: Vec<AppMetrics>,
    pub samples: Vec<BandwidthSample>,
}

impl MetricsSink for MemorySink {
    fn record(&mut self, metrics: AppMetrics) {
        self.apps.push(metrics);
    }

    fn record_sample(&mut self, time: f64, bandwidth: f64) {
        self.samples.push(BandwidthSample { time, bandwidth });
    }
}

/// 整次运行的汇总
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RunSummary {
    pub makespan: f64,
    pub applications: usize,
    pub flows: usize,
    pub bytes: f64,
    pub mean_runtime: f64,
    /// 承载过流量的链路的平均利用率
    pub utilization: f64,
}

/// 输出给 `--out` 的 JSON 报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub applications: Vec<AppMetrics>,
    pub samples: Vec<BandwidthSample>,
    /// 下标为使用过该链路的应用数，值为链路数
    pub sharing_histogram: Vec<usize>,
}

impl RunReport {
    pub fn new(
        makespan: f64,
        sink: MemorySink,
        sharing_histogram: Vec<usize>,
        utilization: f64,
    ) -> Self {
        let mut applications = sink.apps;
        applications.sort_by_key(|m| m.id);
        let runtime: f64 = applications.iter().map(|m| m.runtime).sum();
        let summary = RunSummary {
            makespan,
            applications: applications.len(),
            flows: applications.iter().map(|m| m.flows).sum(),
            bytes: applications.iter().map(|m| m.bytes).sum(),
            mean_runtime: if applications.is_empty() {
                0.0
            } else {
                runtime / applications.len() as f64
            },
            utilization,
        };
        Self {
            summary,
            applications,
            samples: sink.samples,
            sharing_histogram,
        }
    }
}
