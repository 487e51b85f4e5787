//! Integration tests for spec §8's concrete end-to-end scenarios, driven
//! entirely through the public `Engine`/`CollectiveOps` surface rather
//! than any family module's internal function (those get unit-level
//! coverage in `src/collectives/*.rs`).

#![cfg(feature = "sim-transport")]

use oshmem::collectives::algorithm::ReduceOp;
use oshmem::collectives::reduce::ReduceKind;
use oshmem::lock::DistLock;
use oshmem::sim::SimTransport;
use oshmem::transport::{AmoOp, SymAddr, Transport};
use oshmem::{Config, Engine, Pe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Scenario 1: barrier-all / dissemination, N=4 — no PE's post-barrier
/// print can be observed before every PE's pre-barrier print, when
/// checked via a shared side-channel counter.
#[test]
fn scenario_1_barrier_all_orders_prints_across_every_pe() {
    const N: u32 = 4;
    let mut cfg = Config::default();
    cfg.barrier_algorithm = "dissemination".into();

    let arrived = Arc::new(AtomicU32::new(0));
    let saw_incomplete_arrival = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let sim = Arc::new(SimTransport::new(N));
    let arrived2 = Arc::clone(&arrived);
    let saw2 = Arc::clone(&saw_incomplete_arrival);
    let handles: Vec<_> = (0..N)
        .map(|pe| {
            let sim = Arc::clone(&sim);
            let cfg = cfg.clone();
            let arrived = Arc::clone(&arrived2);
            let saw = Arc::clone(&saw2);
            std::thread::spawn(move || {
                let t = sim.handle_for(Pe::new(pe));
                let engine = Engine::init(t, &cfg).unwrap();
                // "print A"
                arrived.fetch_add(1, Ordering::SeqCst);
                engine.collectives().barrier(engine.world()).unwrap();
                // "print B": every PE must have already printed "A".
                if arrived.load(Ordering::SeqCst) != N {
                    saw.store(true, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(!saw_incomplete_arrival.load(Ordering::SeqCst));
    assert_eq!(arrived.load(Ordering::SeqCst), N);
}

/// Scenario 2: broadcast binomial-tree, N=8, root=3, nelems=10 int32.
#[test]
fn scenario_2_broadcast_binomial_tree_delivers_root_payload_to_all() {
    const N: u32 = 8;
    const ROOT: u32 = 3;
    let mut cfg = Config::default();
    cfg.broadcast_algorithm = "binomial_tree".into();

    let expected: Vec<i32> = (100..110).collect();
    let expected_bytes: Vec<u8> = expected.iter().flat_map(|v| v.to_le_bytes()).collect();
    let len = expected_bytes.len();

    let sim = Arc::new(SimTransport::new(N));
    let heap = sim.register_heap(4096);
    let dest = SymAddr::new(heap, 0);
    let expected_bytes = Arc::new(expected_bytes);

    let handles: Vec<_> = (0..N)
        .map(|pe| {
            let sim = Arc::clone(&sim);
            let cfg = cfg.clone();
            let expected_bytes = Arc::clone(&expected_bytes);
            std::thread::spawn(move || {
                let t = sim.handle_for(Pe::new(pe));
                let engine = Engine::init(t, &cfg).unwrap();
                let src = if pe == ROOT { (*expected_bytes).clone() } else { vec![0u8; len] };
                engine
                    .collectives()
                    .broadcast(engine.world(), dest, len, &src, ROOT)
                    .unwrap();
                let mut out = vec![0u8; len];
                engine.transport().get(&mut out, dest, Pe::new(pe)).unwrap();
                out
            })
        })
        .collect();

    for h in handles {
        let out = h.join().unwrap();
        assert_eq!(out, *expected_bytes);
    }
}

/// Scenario 3: fcollect ring, N=4, nelems=2 int.
#[test]
fn scenario_3_fcollect_ring_concatenates_every_pes_contribution_in_order() {
    const N: u32 = 4;
    let mut cfg = Config::default();
    cfg.fcollect_algorithm = "ring".into();

    let sources: Vec<Vec<i32>> = vec![vec![10, 11], vec![20, 21], vec![30, 31], vec![40, 41]];
    let expected: Vec<u8> = sources.iter().flatten().flat_map(|v: &i32| v.to_le_bytes()).collect();
    let per_pe_len = 8; // 2 x i32

    let sim = Arc::new(SimTransport::new(N));
    let heap = sim.register_heap(4096);
    let dest = SymAddr::new(heap, 0);
    let sources = Arc::new(sources);

    let handles: Vec<_> = (0..N)
        .map(|pe| {
            let sim = Arc::clone(&sim);
            let cfg = cfg.clone();
            let sources = Arc::clone(&sources);
            std::thread::spawn(move || {
                let t = sim.handle_for(Pe::new(pe));
                let engine = Engine::init(t, &cfg).unwrap();
                let src: Vec<u8> = sources[pe as usize].iter().flat_map(|v| v.to_le_bytes()).collect();
                engine
                    .collectives()
                    .fcollect(engine.world(), dest, per_pe_len, &src)
                    .unwrap();
                let mut out = vec![0u8; per_pe_len * N as usize];
                engine.transport().get(&mut out, dest, Pe::new(pe)).unwrap();
                out
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
}

/// Scenario 4: all-to-all color-pairwise-exchange/barrier, N=4, nelems=1 int.
#[test]
fn scenario_4_alltoall_color_pairwise_exchange_transposes_the_matrix() {
    const N: u32 = 4;
    let mut cfg = Config::default();
    cfg.alltoall_algorithm = "color_pairwise_exchange_barrier".into();

    let sim = Arc::new(SimTransport::new(N));
    let heap = sim.register_heap(4096);
    let dest = SymAddr::new(heap, 0);

    let handles: Vec<_> = (0..N)
        .map(|pe| {
            let sim = Arc::clone(&sim);
            let cfg = cfg.clone();
            std::thread::spawn(move || {
                let t = sim.handle_for(Pe::new(pe));
                let engine = Engine::init(t, &cfg).unwrap();
                // source on PE k: [k*10+0, k*10+1, k*10+2, k*10+3]
                let src: Vec<u8> = (0..N).flat_map(|j| ((pe * 10 + j) as i32).to_le_bytes()).collect();
                engine.collectives().alltoall(engine.world(), dest, 4, &src).unwrap();
                let mut out = vec![0u8; 4 * N as usize];
                engine.transport().get(&mut out, dest, Pe::new(pe)).unwrap();
                out
            })
        })
        .collect();

    for (j, h) in handles.into_iter().enumerate() {
        let out = h.join().unwrap();
        let got: Vec<i32> = out.chunks(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        let expected: Vec<i32> = (0..N as i32).map(|k| k * 10 + j as i32).collect();
        assert_eq!(got, expected);
    }
}

/// Scenario 5: reduce Rabenseifner SUM, N=5 (non-power-of-two), nreduce=3.
#[test]
fn scenario_5_rabenseifner_sum_reduce_non_power_of_two() {
    const N: u32 = 5;
    let mut cfg = Config::default();
    cfg.reduce_algorithm = "rabenseifner".into();

    let sim = Arc::new(SimTransport::new(N));
    let heap = sim.register_heap(4096);
    let dest = SymAddr::new(heap, 0);

    let handles: Vec<_> = (0..N)
        .map(|pe| {
            let sim = Arc::clone(&sim);
            let cfg = cfg.clone();
            std::thread::spawn(move || {
                let t = sim.handle_for(Pe::new(pe));
                let engine = Engine::init(t, &cfg).unwrap();
                let src: Vec<u8> = [pe as i32, pe as i32, pe as i32].iter().flat_map(|v| v.to_le_bytes()).collect();
                engine
                    .collectives()
                    .reduce(engine.world(), ReduceOp::Sum, ReduceKind::I32, dest, &src, 3)
                    .unwrap();
                let mut out = [0u8; 12];
                engine.transport().get(&mut out, dest, Pe::new(pe)).unwrap();
                let got: Vec<i32> = out.chunks(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
                got
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), vec![10, 10, 10]);
    }
}

/// Scenario 6: distributed lock contention, N=8, 100 iters, final counter
/// on PE 0 equals N * iters with no intermediate overshoot.
#[test]
fn scenario_6_lock_contention_serializes_every_increment() {
    const N: u32 = 8;
    const ITERS: u64 = 100;

    let sim = Arc::new(SimTransport::new(N));
    let heap_idx = sim.register_heap(4096);
    let lock_addr = SymAddr::new(heap_idx, 0);
    let counter_addr = SymAddr::new(heap_idx, 64);
    let in_critical = Arc::new(AtomicU32::new(0));
    let max_observed = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..N)
        .map(|pe| {
            let sim = Arc::clone(&sim);
            let in_critical = Arc::clone(&in_critical);
            let max_observed = Arc::clone(&max_observed);
            std::thread::spawn(move || {
                let t = sim.handle_for(Pe::new(pe));
                let lock = DistLock::new(lock_addr, N);
                let mut last_seen = 0u64;
                for _ in 0..ITERS {
                    lock.acquire(&t);
                    let cur = in_critical.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(cur, Ordering::SeqCst);
                    let before = t.amo(counter_addr, AmoOp::Add(1), Pe::new(0)).unwrap();
                    assert!(before >= last_seen);
                    last_seen = before + 1;
                    in_critical.fetch_sub(1, Ordering::SeqCst);
                    lock.release(&t);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(max_observed.load(Ordering::SeqCst), 1);
    let t0 = sim.handle_for(Pe::new(0));
    let total = t0.amo(counter_addr, AmoOp::Add(0), Pe::new(0)).unwrap();
    assert_eq!(total, N as u64 * ITERS);
}
