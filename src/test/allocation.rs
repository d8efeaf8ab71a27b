use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::SimError;
use crate::net::{AppId, RoutingMode, RoutingTable};
use crate::sched::{
    AllocationOutcome, AllocationStrategy, Cluster, admit, allocate, release,
};
use crate::topo::Topology;
use crate::topo::jellyfish::Jellyfish;

/// 4 台交换机成环，每台挂 2 台服务器，每台服务器 2 核
fn ring_cluster() -> (Cluster, RoutingTable) {
    let adj = vec![vec![1, 3], vec![2, 0], vec![3, 1], vec![0, 2]];
    let topo = Jellyfish::from_switch_adjacency(&adj, 2).expect("ring");
    let cluster = Cluster::new(topo.num_servers(), 2, topo.servers_per_switch());
    (cluster, RoutingTable::build(&topo, RoutingMode::Ksp { k: 2 }))
}

/// 单交换机、2 台服务器、每台 4 核
fn small_cluster() -> (Cluster, RoutingTable) {
    let topo = Jellyfish::from_switch_adjacency(&[vec![]], 2).expect("single switch");
    let cluster = Cluster::new(topo.num_servers(), 4, topo.servers_per_switch());
    (cluster, RoutingTable::build(&topo, RoutingMode::Ksp { k: 1 }))
}

fn placed(outcome: AllocationOutcome) -> crate::sched::Allocation {
    match outcome {
        AllocationOutcome::Placed(a) => a,
        AllocationOutcome::Blocked => panic!("expected placement"),
    }
}

const ALL: [AllocationStrategy; 6] = [
    AllocationStrategy::Sequential,
    AllocationStrategy::Random,
    AllocationStrategy::Spread,
    AllocationStrategy::RandomSwitch,
    AllocationStrategy::Contiguous,
    AllocationStrategy::Locality,
];

#[test]
fn sequential_fills_first_server() {
    let (mut cluster, rt) = small_cluster();
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(cluster.free_cores(), 8);

    let alloc = placed(
        allocate(AllocationStrategy::Sequential, &mut cluster, &rt, AppId(0), 4, &mut rng)
            .expect("allocate"),
    );
    assert_eq!(alloc.cores, vec![0, 1, 2, 3]);
    assert!(alloc.inactive.is_empty());
    assert_eq!(cluster.free_cores(), 4);
    assert_eq!(cluster.server(0).busy, 4);
    assert_eq!(cluster.server(1).free, 4);
    assert_eq!(cluster.core_owner(2), Some(AppId(0)));
    assert!(cluster.check_invariants());
}

#[test]
fn allocate_then_release_restores_counts() {
    for strategy in ALL {
        let (mut cluster, rt) = ring_cluster();
        let mut rng = StdRng::seed_from_u64(11);
        // 先占一部分，避免只测空集群
        let other = placed(
            allocate(AllocationStrategy::Sequential, &mut cluster, &rt, AppId(9), 1, &mut rng)
                .expect("warm-up"),
        );

        let free = cluster.free_cores();
        let busy = cluster.busy_cores();
        let alloc = placed(
            allocate(strategy, &mut cluster, &rt, AppId(1), 5, &mut rng).expect("allocate"),
        );
        assert_eq!(alloc.cores.len(), 5, "{strategy:?}");
        assert!(cluster.check_invariants(), "{strategy:?}");
        for &c in &alloc.cores {
            assert_eq!(cluster.core_owner(c), Some(AppId(1)), "{strategy:?}");
        }

        release(&mut cluster, &alloc);
        assert_eq!(cluster.free_cores(), free, "{strategy:?}");
        assert_eq!(cluster.busy_cores(), busy, "{strategy:?}");
        assert_eq!(cluster.inactive_cores(), 0, "{strategy:?}");
        assert!(cluster.check_invariants(), "{strategy:?}");

        release(&mut cluster, &other);
        assert!(cluster.is_idle());
    }
}

#[test]
fn whole_cluster_fits_when_idle_and_oversize_is_fatal() {
    for strategy in ALL {
        let (mut cluster, rt) = ring_cluster();
        let mut rng = StdRng::seed_from_u64(5);
        let total = cluster.total_cores();

        let err = allocate(strategy, &mut cluster, &rt, AppId(0), total + 1, &mut rng);
        assert!(
            matches!(err, Err(SimError::ApplicationTooLarge { tasks, total: t, .. }) if tasks == total + 1 && t == total),
            "{strategy:?}"
        );
        assert!(cluster.is_idle());

        let alloc = placed(
            allocate(strategy, &mut cluster, &rt, AppId(0), total, &mut rng).expect("fits"),
        );
        assert_eq!(alloc.cores.len(), total);
        assert_eq!(cluster.free_cores(), 0);
    }
}

#[test]
fn busy_cluster_blocks_without_mutation() {
    let (mut cluster, rt) = small_cluster();
    let mut rng = StdRng::seed_from_u64(0);
    placed(
        allocate(AllocationStrategy::Sequential, &mut cluster, &rt, AppId(0), 6, &mut rng)
            .expect("first"),
    );
    assert!(!admit(&cluster, 4));

    let outcome = allocate(AllocationStrategy::Sequential, &mut cluster, &rt, AppId(1), 4, &mut rng)
        .expect("not fatal");
    assert_eq!(outcome, AllocationOutcome::Blocked);
    assert_eq!(cluster.free_cores(), 2);
    assert!(cluster.check_invariants());
}

#[test]
fn contiguous_reserves_whole_switches() {
    let (mut cluster, rt) = ring_cluster();
    let mut rng = StdRng::seed_from_u64(0);
    let alloc = placed(
        allocate(AllocationStrategy::Contiguous, &mut cluster, &rt, AppId(0), 5, &mut rng)
            .expect("contiguous"),
    );
    // 5 个任务需要 3 台服务器，即 2 台交换机（8 核）
    assert_eq!(alloc.switches.len(), 2);
    assert_eq!(alloc.cores.len(), 5);
    assert_eq!(alloc.inactive.len(), 3);
    assert_eq!(cluster.inactive_cores(), 3);
    assert_eq!(cluster.busy_cores(), 8);
    for &sw in &alloc.switches {
        assert!(cluster.is_switch_reserved(sw));
    }
    // 预留的交换机在环上相邻
    let (a, b) = (alloc.switches[0], alloc.switches[1]);
    assert_eq!(rt.distance(a, b), Some(1));

    release(&mut cluster, &alloc);
    assert!(cluster.is_idle());
    assert!((0..4).all(|sw| !cluster.is_switch_reserved(sw)));
}

#[test]
fn spread_takes_one_core_per_switch_first() {
    let (mut cluster, rt) = ring_cluster();
    let mut rng = StdRng::seed_from_u64(0);
    let alloc = placed(
        allocate(AllocationStrategy::Spread, &mut cluster, &rt, AppId(0), 4, &mut rng)
            .expect("spread"),
    );
    assert_eq!(alloc.cores, vec![0, 4, 8, 12]);
}

#[test]
fn random_switch_stays_on_one_switch_when_it_fits() {
    let (mut cluster, rt) = ring_cluster();
    let mut rng = StdRng::seed_from_u64(3);
    let alloc = placed(
        allocate(AllocationStrategy::RandomSwitch, &mut cluster, &rt, AppId(0), 4, &mut rng)
            .expect("random switch"),
    );
    let sw = alloc.cores[0] / 4;
    assert!(alloc.cores.iter().all(|c| c / 4 == sw));
}

#[test]
fn random_picks_distinct_free_cores_deterministically() {
    let run = |seed| {
        let (mut cluster, rt) = ring_cluster();
        let mut rng = StdRng::seed_from_u64(seed);
        placed(
            allocate(AllocationStrategy::Random, &mut cluster, &rt, AppId(0), 10, &mut rng)
                .expect("random"),
        )
        .cores
    };
    let a = run(21);
    let mut uniq = a.clone();
    uniq.sort_unstable();
    uniq.dedup();
    assert_eq!(uniq.len(), 10);
    assert_eq!(a, run(21));
}

#[test]
fn locality_starts_from_the_emptiest_switch() {
    let (mut cluster, rt) = ring_cluster();
    let mut rng = StdRng::seed_from_u64(0);
    placed(
        allocate(AllocationStrategy::Sequential, &mut cluster, &rt, AppId(0), 1, &mut rng)
            .expect("first"),
    );
    let alloc = placed(
        allocate(AllocationStrategy::Locality, &mut cluster, &rt, AppId(1), 4, &mut rng)
            .expect("locality"),
    );
    assert_eq!(alloc.cores, vec![4, 5, 6, 7]);
}

#[test]
fn allocation_selector_parsing() {
    assert_eq!(
        AllocationStrategy::parse("random-switch").unwrap(),
        AllocationStrategy::RandomSwitch
    );
    assert_eq!(
        AllocationStrategy::parse("Contiguous").unwrap(),
        AllocationStrategy::Contiguous
    );
    assert!(matches!(
        AllocationStrategy::parse("best_fit"),
        Err(SimError::UnknownSelector { kind: "allocation", .. })
    ));
}
