use crate::error::SimError;
use crate::net::NodeId;
use crate::topo::Topology;
use crate::topo::jellyfish::{Jellyfish, JellyfishOpts, build_jellyfish};

#[test]
fn jellyfish_is_regular_and_symmetric() {
    let opts = JellyfishOpts {
        switches: 12,
        ports_per_switch: 6,
        servers_per_switch: 2,
        seed: 7,
    };
    let topo = build_jellyfish(&opts).expect("build jellyfish");
    assert_eq!(topo.num_switches(), 12);
    assert_eq!(topo.num_servers(), 24);

    for s in 0..topo.num_switches() {
        let nbrs = topo.switch_neighbors(s);
        assert_eq!(nbrs.len(), opts.degree(), "switch {s} degree");
        for (t, port) in nbrs {
            assert_ne!(t, s);
            let node = topo.switch_node(s);
            let peer = topo.neighbor(node, port).expect("connected port");
            let back = topo.neighbor(peer.node, peer.port).expect("reverse port");
            assert_eq!(back.node, node);
            assert_eq!(back.port, port);
        }
    }
}

#[test]
fn jellyfish_servers_hang_off_their_switch() {
    let topo = build_jellyfish(&JellyfishOpts::default()).expect("build jellyfish");
    let sps = topo.servers_per_switch();
    for server in 0..topo.num_servers() {
        assert_eq!(topo.port_count(NodeId(server)), 1);
        let up = topo.neighbor(NodeId(server), 0).expect("uplink");
        assert_eq!(up.node, topo.switch_node(server / sps));
        assert_eq!(up.port, server % sps);
        assert_eq!(topo.server_switch(server), server / sps);
    }
}

#[test]
fn jellyfish_same_seed_same_graph() {
    let opts = JellyfishOpts {
        seed: 42,
        ..JellyfishOpts::default()
    };
    let a = build_jellyfish(&opts).expect("a");
    let b = build_jellyfish(&opts).expect("b");
    for s in 0..a.num_switches() {
        assert_eq!(a.switch_neighbors(s), b.switch_neighbors(s));
    }
}

#[test]
fn jellyfish_rejects_impossible_degree() {
    let too_few = JellyfishOpts {
        switches: 3,
        ports_per_switch: 8,
        servers_per_switch: 4,
        seed: 0,
    };
    assert!(matches!(build_jellyfish(&too_few), Err(SimError::Topology(_))));

    let odd = JellyfishOpts {
        switches: 5,
        ports_per_switch: 4,
        servers_per_switch: 1,
        seed: 0,
    };
    assert!(matches!(build_jellyfish(&odd), Err(SimError::Topology(_))));

    let no_uplinks = JellyfishOpts {
        switches: 8,
        ports_per_switch: 2,
        servers_per_switch: 2,
        seed: 0,
    };
    assert!(matches!(build_jellyfish(&no_uplinks), Err(SimError::Topology(_))));
}

#[test]
fn switch_adjacency_must_be_symmetric() {
    let bad = vec![vec![1], vec![]];
    assert!(matches!(
        Jellyfish::from_switch_adjacency(&bad, 1),
        Err(SimError::Topology(_))
    ));

    let ring = vec![vec![1, 3], vec![0, 2], vec![1, 3], vec![0, 2]];
    let topo = Jellyfish::from_switch_adjacency(&ring, 2).expect("ring");
    assert_eq!(topo.max_degree(), 2);
    // 第 i 个邻居占用端口 servers_per_switch + i
    assert_eq!(topo.switch_neighbors(0), vec![(1, 2), (3, 3)]);
}
