use std::collections::BTreeSet;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::SimError;
use crate::net::AppId;
use crate::sched::{
    Cluster, MappingStrategy, StorageStrategy, allocate_storage, map, release_storage, translate,
};

fn cluster() -> Cluster {
    Cluster::new(4, 2, 2)
}

#[test]
fn remote_storage_uses_distinct_servers() {
    let mut c = cluster();
    let mut rng = StdRng::seed_from_u64(1);
    let slots =
        allocate_storage(StorageStrategy::Remote, &mut c, AppId(0), 3, &[], &mut rng).expect("remote");
    let servers: BTreeSet<usize> = slots.iter().map(|&s| c.server_of(s)).collect();
    assert_eq!(servers.len(), 3);
    for &slot in &slots {
        assert_eq!(slot, c.storage_slot(c.server_of(slot)));
        assert_eq!(c.server(c.server_of(slot)).storage, 1);
    }
    // 存储不占核心
    assert!(c.is_idle());

    release_storage(&mut c, &slots);
    assert!((0..4).all(|s| c.server(s).storage == 0));

    let err = allocate_storage(StorageStrategy::Remote, &mut c, AppId(0), 5, &[], &mut rng);
    assert!(matches!(err, Err(SimError::StoragePlacement { .. })));
}

#[test]
fn local_storage_stays_on_task_servers() {
    let mut c = cluster();
    let mut rng = StdRng::seed_from_u64(2);
    let task_cores = [0, 1, 4];
    let slots = allocate_storage(StorageStrategy::Local, &mut c, AppId(0), 2, &task_cores, &mut rng)
        .expect("local");
    let servers: BTreeSet<usize> = slots.iter().map(|&s| c.server_of(s)).collect();
    assert_eq!(servers, BTreeSet::from([0, 2]));

    let err = allocate_storage(StorageStrategy::Local, &mut c, AppId(0), 3, &task_cores, &mut rng);
    assert!(matches!(err, Err(SimError::StoragePlacement { .. })));
}

#[test]
fn cache_storage_round_robins_across_calls() {
    let mut c = cluster();
    let mut rng = StdRng::seed_from_u64(3);
    let first =
        allocate_storage(StorageStrategy::Cache, &mut c, AppId(0), 3, &[], &mut rng).expect("cache");
    assert_eq!(first, vec![1, 3, 5]);
    let second =
        allocate_storage(StorageStrategy::Cache, &mut c, AppId(1), 2, &[], &mut rng).expect("cache");
    assert_eq!(second, vec![7, 1]);
    assert_eq!(c.server(0).storage, 2);
}

#[test]
fn consecutive_mapping_keeps_allocation_order() {
    let mut rng = StdRng::seed_from_u64(0);
    let table = map(MappingStrategy::Consecutive, &[4, 5, 6], &[9], &mut rng);
    assert_eq!(table, vec![4, 5, 6, 9]);
    assert_eq!(translate(&table, 0, 2), 2);
    assert_eq!(translate(&table, 3, 2), 4);
}

#[test]
fn random_mapping_permutes_tasks_but_not_storage() {
    let mut rng = StdRng::seed_from_u64(8);
    let cores: Vec<usize> = (0..16).collect();
    let table = map(MappingStrategy::Random, &cores, &[31, 33], &mut rng);
    assert_eq!(table.len(), 18);
    assert_eq!(&table[16..], &[31, 33]);
    let mut tasks = table[..16].to_vec();
    assert_ne!(tasks, cores);
    tasks.sort_unstable();
    assert_eq!(tasks, cores);
}

#[test]
fn storage_and_mapping_selector_parsing() {
    assert_eq!(StorageStrategy::parse("LOCAL").unwrap(), StorageStrategy::Local);
    assert_eq!(MappingStrategy::parse("random").unwrap(), MappingStrategy::Random);
    assert!(matches!(
        StorageStrategy::parse("nfs"),
        Err(SimError::UnknownSelector { kind: "storage", .. })
    ));
    assert!(matches!(
        MappingStrategy::parse("snake"),
        Err(SimError::UnknownSelector { kind: "mapping", .. })
    ));
}
