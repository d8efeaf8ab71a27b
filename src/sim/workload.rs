//! workload.json 结构
//!
//! 拓扑、可选的运行配置，以及按到达时间排队的应用列表。

use serde::{Deserialize, Serialize};

use super::config::SimConfig;
use crate::app::{Application, KernelSpec};
use crate::error::{Result, SimError};
use crate::net::AppId;
use crate::sched::{AllocationStrategy, MappingStrategy, StorageStrategy};
use crate::topo::Topology;
use crate::topo::jellyfish::{Jellyfish, JellyfishOpts, build_jellyfish};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub schema_version: u32,
    pub topology: TopologySpec,
    #[serde(default)]
    pub config: Option<SimConfig>,
    #[serde(default)]
    pub applications: Vec<ApplicationSpec>,
}

fn default_cores_per_server() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    Jellyfish {
        switches: usize,
        ports_per_switch: usize,
        servers_per_switch: usize,
        #[serde(default = "default_cores_per_server")]
        cores_per_server: usize,
        #[serde(default)]
        seed: u64,
    },
    /// 显式给出交换机邻接表
    SwitchGraph {
        adjacency: Vec<Vec<usize>>,
        servers_per_switch: usize,
        #[serde(default = "default_cores_per_server")]
        cores_per_server: usize,
    },
}

impl TopologySpec {
    pub fn cores_per_server(&self) -> usize {
        match *self {
            Self::Jellyfish {
                cores_per_server, ..
            }
            | Self::SwitchGraph {
                cores_per_server, ..
            } => cores_per_server,
        }
    }

    pub fn build(&self) -> Result<Jellyfish> {
        if self.cores_per_server() == 0 {
            return Err(SimError::Topology("cores_per_server must be positive".into()));
        }
        match self {
            Self::Jellyfish {
                switches,
                ports_per_switch,
                servers_per_switch,
                seed,
                ..
            } => build_jellyfish(&JellyfishOpts {
                switches: *switches,
                ports_per_switch: *ports_per_switch,
                servers_per_switch: *servers_per_switch,
                seed: *seed,
            }),
            Self::SwitchGraph {
                adjacency,
                servers_per_switch,
                ..
            } => Jellyfish::from_switch_adjacency(adjacency, *servers_per_switch),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSpec {
    #[serde(default)]
    pub arrival: f64,
    pub tasks: usize,
    #[serde(default)]
    pub storage: usize,
    #[serde(default)]
    pub allocation: Option<String>,
    #[serde(default)]
    pub mapping: Option<String>,
    #[serde(default)]
    pub storage_strategy: Option<String>,
    pub kernel: KernelSpec,
}

impl ApplicationSpec {
    pub fn build(&self, id: AppId) -> Result<Application> {
        if self.tasks == 0 {
            return Err(SimError::Workload(format!("application {} has no tasks", id.0)));
        }
        if !self.arrival.is_finite() || self.arrival < 0.0 {
            return Err(SimError::Workload(format!(
                "application {} has invalid arrival time {}",
                id.0, self.arrival
            )));
        }
        let allocation = self
            .allocation
            .as_deref()
            .map(AllocationStrategy::parse)
            .transpose()?
            .unwrap_or_default();
        let mapping = self
            .mapping
            .as_deref()
            .map(MappingStrategy::parse)
            .transpose()?
            .unwrap_or_default();
        let storage = self
            .storage_strategy
            .as_deref()
            .map(StorageStrategy::parse)
            .transpose()?
            .unwrap_or_default();

        Ok(
            Application::new(id, self.arrival, self.tasks, Box::new(self.kernel.clone()))
                .with_allocation(allocation)
                .with_mapping(mapping)
                .with_storage(self.storage, storage),
        )
    }
}

impl WorkloadSpec {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn build_applications(&self) -> Result<Vec<Application>> {
        self.applications
            .iter()
            .enumerate()
            .map(|(i, spec)| spec.build(AppId(i)))
            .collect()
    }

    /// 拓扑、每服务器核心数
    pub fn build_topology(&self) -> Result<(Box<dyn Topology>, usize)> {
        let topo = self.topology.build()?;
        Ok((Box::new(topo), self.topology.cores_per_server()))
    }
}
