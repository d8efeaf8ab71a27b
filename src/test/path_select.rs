use crate::net::{AppId, Network, PathPolicy, PathSelector, RoutingMode};
use crate::topo::jellyfish::Jellyfish;

#[test]
fn round_robin_cycles_per_destination() {
    let mut sel = PathSelector::new(PathPolicy::RoundRobin);
    let picks: Vec<_> = (0..4)
        .map(|_| sel.select(AppId(0), 0, 5, 3, |_| None))
        .collect();
    assert_eq!(picks, vec![Some(0), Some(1), Some(2), Some(0)]);

    // 另一个目的服务器有自己的游标
    assert_eq!(sel.select(AppId(0), 0, 6, 3, |_| None), Some(0));
    assert_eq!(sel.select(AppId(0), 0, 6, 0, |_| None), None);
}

#[test]
fn adaptive_skips_paths_dominated_by_other_apps() {
    let mut sel = PathSelector::new(PathPolicy::Adaptive);
    let owner = |i: usize| (i == 0).then_some(AppId(1));

    assert_eq!(sel.select(AppId(0), 0, 5, 3, owner), Some(1));
    // 游标已移到 2
    assert_eq!(sel.select(AppId(0), 0, 5, 3, owner), Some(2));
    // 从 0 开始，0 被占，跳到 1
    assert_eq!(sel.select(AppId(0), 0, 5, 3, owner), Some(1));

    // 多数方就是自己时不跳过
    let mut sel = PathSelector::new(PathPolicy::Adaptive);
    assert_eq!(sel.select(AppId(1), 0, 5, 3, owner), Some(0));
}

#[test]
fn adaptive_falls_back_to_cursor_when_everything_is_taken() {
    let mut sel = PathSelector::new(PathPolicy::Adaptive);
    let owner = |_: usize| Some(AppId(7));
    assert_eq!(sel.select(AppId(0), 0, 5, 2, owner), Some(0));
    assert_eq!(sel.select(AppId(0), 0, 5, 2, owner), Some(1));
}

#[test]
fn network_route_expands_switch_path_into_hops() {
    let ring = vec![vec![1, 3], vec![2, 0], vec![3, 1], vec![0, 2]];
    let topo = Jellyfish::from_switch_adjacency(&ring, 1).expect("ring");
    let mut net = Network::new(Box::new(topo), RoutingMode::Ksp { k: 2 }, PathPolicy::RoundRobin);

    // 服务器 0 挂在交换机 0，服务器 2 挂在交换机 2
    let path = net.route(AppId(0), 0, 2).expect("path");
    assert_eq!(path.len(), 4);
    assert_eq!(path.hops[0].node.0, 0);
    assert_eq!(path.hops[0].port, 0);
    let links = net.path_links(&path);
    assert_eq!(links.len(), 4);
    assert_eq!(net.server_distance(0, 2), Some(2));

    assert!(net.route(AppId(0), 1, 1).expect("local").is_empty());
}
