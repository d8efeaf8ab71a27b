use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::app::{KernelSpec, TaskEvent, TrafficKernel, validate};
use crate::error::SimError;
use crate::net::TrafficClass;

fn rng() -> StdRng {
    StdRng::seed_from_u64(0)
}

fn sends(q: &[TaskEvent]) -> usize {
    q.iter().filter(|e| matches!(e, TaskEvent::Send { .. })).count()
}

#[test]
fn all_to_all_sends_once_to_every_peer() {
    let queues = KernelSpec::AllToAll { bytes: 64 }
        .generate(4, 0, &mut rng())
        .expect("all to all");
    assert_eq!(queues.len(), 4);
    for q in &queues {
        assert_eq!(sends(q), 3);
        assert_eq!(q.len(), 6);
    }
}

#[test]
fn ring_interleaves_compute_and_neighbour_exchange() {
    let kernel = KernelSpec::Ring {
        bytes: 10,
        rounds: 2,
        compute: 1.5,
    };
    let queues = kernel.generate(3, 0, &mut rng()).expect("ring");
    assert_eq!(
        queues[0],
        vec![
            TaskEvent::compute(1.5),
            TaskEvent::send(1, 10, 0),
            TaskEvent::recv(2, 10, 0),
            TaskEvent::compute(1.5),
            TaskEvent::send(1, 10, 1),
            TaskEvent::recv(2, 10, 1),
        ]
    );
}

#[test]
fn random_pairs_are_balanced() {
    let queues = KernelSpec::RandomPairs {
        bytes: 8,
        messages: 5,
    }
    .generate(6, 0, &mut rng())
    .expect("random pairs");
    assert!(queues.iter().all(|q| sends(q) == 5));
    assert!(validate(&queues).is_ok());
}

#[test]
fn storage_io_direction_follows_class() {
    let write = KernelSpec::StorageIo {
        bytes: 100,
        class: TrafficClass::SanWrite,
    }
    .generate(3, 2, &mut rng())
    .expect("write");
    assert_eq!(write.len(), 5);
    assert_eq!(
        write[2],
        vec![TaskEvent::send(3, 100, 2).with_class(TrafficClass::SanWrite)]
    );
    assert_eq!(sends(&write[3]), 0);
    assert_eq!(write[3].len(), 2);

    let read = KernelSpec::StorageIo {
        bytes: 100,
        class: TrafficClass::StorageRead,
    }
    .generate(2, 1, &mut rng())
    .expect("read");
    assert_eq!(sends(&read[2]), 2);
    assert!(matches!(read[0][0], TaskEvent::Recv { from: 2, .. }));
}

#[test]
fn storage_io_needs_storage() {
    let comm = KernelSpec::StorageIo {
        bytes: 1,
        class: TrafficClass::Comm,
    };
    assert!(matches!(comm.generate(2, 1, &mut rng()), Err(SimError::Workload(_))));

    let no_nodes = KernelSpec::StorageIo {
        bytes: 1,
        class: TrafficClass::StorageWrite,
    };
    assert!(matches!(no_nodes.generate(2, 0, &mut rng()), Err(SimError::Workload(_))));
}

#[test]
fn validate_rejects_bad_event_graphs() {
    let unmatched = vec![vec![TaskEvent::send(1, 10, 0)], vec![]];
    assert!(matches!(validate(&unmatched), Err(SimError::Workload(_))));

    let wrong_tag = vec![vec![TaskEvent::send(1, 10, 0)], vec![TaskEvent::recv(0, 10, 1)]];
    assert!(validate(&wrong_tag).is_err());

    let out_of_range = vec![vec![TaskEvent::send(5, 10, 0)]];
    assert!(validate(&out_of_range).is_err());

    let to_self = vec![vec![TaskEvent::send(0, 10, 0), TaskEvent::recv(0, 10, 0)]];
    assert!(validate(&to_self).is_err());

    let negative = vec![vec![TaskEvent::compute(-1.0)]];
    assert!(validate(&negative).is_err());
}

#[test]
fn explicit_kernel_pads_missing_participants() {
    let kernel = KernelSpec::Explicit {
        tasks: vec![vec![TaskEvent::compute(1.0)]],
    };
    let queues = kernel.generate(3, 0, &mut rng()).expect("explicit");
    assert_eq!(queues.len(), 3);
    assert!(queues[1].is_empty() && queues[2].is_empty());

    assert!(kernel.generate(0, 0, &mut rng()).is_err());
    assert_eq!(kernel.name(), "explicit");
}

#[test]
fn kernel_spec_parses_from_json() {
    let raw = r#"{ "kind": "ring", "bytes": 1024 }"#;
    let kernel: KernelSpec = serde_json::from_str(raw).expect("parse kernel");
    assert_eq!(
        kernel,
        KernelSpec::Ring {
            bytes: 1024,
            rounds: 1,
            compute: 0.0
        }
    );

    let raw = r#"{ "kind": "explicit", "tasks": [
        [ { "kind": "send", "to": 1, "bytes": 5, "class": "san_write" } ],
        [ { "kind": "recv", "from": 0, "bytes": 5 } ]
    ] }"#;
    let kernel: KernelSpec = serde_json::from_str(raw).expect("parse explicit");
    let KernelSpec::Explicit { tasks } = kernel else {
        panic!("expected explicit kernel");
    };
    assert_eq!(
        tasks[0][0],
        TaskEvent::send(1, 5, 0).with_class(TrafficClass::SanWrite)
    );
}
