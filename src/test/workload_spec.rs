use crate::error::SimError;
use crate::net::{BandwidthModel, RoutingMode, TrafficSplit};
use crate::sched::{AllocationStrategy, MappingStrategy, StorageStrategy};
use crate::sim::{SimConfig, TopologySpec, WorkloadSpec};

#[test]
fn workload_spec_parses_minimal_json_with_defaults() {
    let raw = r#"
    {
        "schema_version": 1,
        "topology": { "kind": "jellyfish", "switches": 8, "ports_per_switch": 5, "servers_per_switch": 2 },
        "applications": [
            { "tasks": 4, "kernel": { "kind": "compute_only", "duration": 1.0 } }
        ]
    }
    "#;
    let wl = WorkloadSpec::from_json(raw).expect("parse workload");
    assert_eq!(wl.schema_version, 1);
    assert!(wl.config.is_none());
    assert!(matches!(
        wl.topology,
        TopologySpec::Jellyfish {
            switches: 8,
            cores_per_server: 1,
            seed: 0,
            ..
        }
    ));

    let apps = wl.build_applications().expect("applications");
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].tasks, 4);
    assert_eq!(apps[0].storage, 0);
    assert_eq!(apps[0].arrival, 0.0);
    assert_eq!(apps[0].allocation, AllocationStrategy::Sequential);
    assert_eq!(apps[0].mapping, MappingStrategy::Consecutive);
    assert_eq!(apps[0].kernel.name(), "compute_only");

    let (topo, cps) = wl.build_topology().expect("topology");
    assert_eq!(topo.num_servers(), 16);
    assert_eq!(cps, 1);
}

#[test]
fn workload_spec_parses_config_and_strategies() {
    let raw = r#"
    {
        "schema_version": 1,
        "topology": {
            "kind": "switch_graph",
            "adjacency": [[1], [0]],
            "servers_per_switch": 2,
            "cores_per_server": 4
        },
        "config": {
            "bandwidth_model": "accurate",
            "traffic_split": { "kind": "reserved", "comm_percent": 70 },
            "link_bandwidth": 10,
            "injection_window": 2,
            "routing": { "kind": "llskr", "k": 6, "ths": 2 },
            "path_policy": "adaptive",
            "seed": 9
        },
        "applications": [
            {
                "arrival": 2.5,
                "tasks": 3,
                "storage": 1,
                "allocation": "contiguous",
                "mapping": "random",
                "storage_strategy": "local",
                "kernel": { "kind": "storage_io", "bytes": 10, "class": "storage_write" }
            }
        ]
    }
    "#;
    let wl = WorkloadSpec::from_json(raw).expect("parse workload");
    let cfg = wl.config.clone().expect("config");
    assert_eq!(cfg.bandwidth_model, BandwidthModel::Accurate);
    assert_eq!(cfg.traffic_split, TrafficSplit::Reserved { comm_percent: 70.0 });
    assert_eq!(cfg.link_bandwidth, 10.0);
    assert_eq!(cfg.injection_window, 2);
    assert_eq!(cfg.subflows, 1);
    assert_eq!(cfg.routing, RoutingMode::Llskr { k: 6, ths: 2 });
    assert_eq!(cfg.seed, 9);
    assert!(cfg.array_bandwidth.is_none());

    let apps = wl.build_applications().expect("applications");
    assert_eq!(apps[0].arrival, 2.5);
    assert_eq!(apps[0].allocation, AllocationStrategy::Contiguous);
    assert_eq!(apps[0].mapping, MappingStrategy::Random);
    assert_eq!(apps[0].storage_strategy, StorageStrategy::Local);
    assert_eq!(apps[0].participants_len(), 4);

    let (topo, cps) = wl.build_topology().expect("topology");
    assert_eq!(topo.num_switches(), 2);
    assert_eq!(cps, 4);
}

#[test]
fn empty_config_object_uses_defaults() {
    let cfg: SimConfig = serde_json::from_str("{}").expect("config");
    assert_eq!(cfg, SimConfig::default());
    assert_eq!(cfg.link_bandwidth, 100.0);
    assert_eq!(cfg.routing, RoutingMode::Ksp { k: 4 });
}

#[test]
fn unknown_selector_and_empty_application_are_rejected() {
    let raw = r#"
    {
        "schema_version": 1,
        "topology": { "kind": "switch_graph", "adjacency": [[]], "servers_per_switch": 2 },
        "applications": [
            { "tasks": 2, "allocation": "best_fit", "kernel": { "kind": "compute_only", "duration": 1.0 } }
        ]
    }
    "#;
    let wl = WorkloadSpec::from_json(raw).expect("parse workload");
    assert!(matches!(
        wl.build_applications(),
        Err(SimError::UnknownSelector {
            kind: "allocation",
            ..
        })
    ));

    let raw = raw.replace(r#""tasks": 2, "allocation": "best_fit","#, r#""tasks": 0,"#);
    let wl = WorkloadSpec::from_json(&raw).expect("parse workload");
    assert!(matches!(wl.build_applications(), Err(SimError::Workload(_))));

    let bad_kernel = r#"
    {
        "schema_version": 1,
        "topology": { "kind": "switch_graph", "adjacency": [[]], "servers_per_switch": 2 },
        "applications": [ { "tasks": 2, "kernel": { "kind": "mesh" } } ]
    }
    "#;
    assert!(matches!(WorkloadSpec::from_json(bad_kernel), Err(SimError::Json(_))));
}
