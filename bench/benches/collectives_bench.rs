//! Microbenchmarks for the collective engine, run over the in-process
//! `sim-transport` cluster (no real network, so these measure algorithm
//! and dispatch overhead rather than wire cost — useful for comparing
//! algorithm choices against each other, not for absolute throughput
//! numbers).

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oshmem::collectives::algorithm::{BarrierAlgorithm, ReduceAlgorithm, ReduceOp};
use oshmem::collectives::reduce::ReduceKind;
use oshmem::collectives::{alltoall, barrier, reduce};
use oshmem::pe::Pe;
use oshmem::sim::SimTransport;
use oshmem::team::Team;
use oshmem::transport::SymAddr;
use std::hint::black_box;
use std::sync::Arc;

const PE_COUNTS: [u32; 3] = [2, 4, 8];

/// One simulated heap big enough for a team's two pSync arrays plus
/// whatever payload a benchmark needs.
fn new_cluster(n: u32, payload_bytes: usize) -> (Arc<SimTransport>, SymAddr, SymAddr, SymAddr) {
    let sim = Arc::new(SimTransport::new(n));
    let heap = sim.register_heap(payload_bytes + 65536);
    let barrier_psync = SymAddr::new(heap, 0);
    let collective_psync = SymAddr::new(heap, 8192);
    let payload = SymAddr::new(heap, 16384);
    (sim, barrier_psync, collective_psync, payload)
}

/// Runs `f` on every simulated PE concurrently and waits for all of them.
fn run_on_every_pe<F>(sim: &Arc<SimTransport>, n: u32, barrier_psync: SymAddr, collective_psync: SymAddr, f: F)
where
    F: Fn(u32, &Team, &oshmem::sim::SimHandle) + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let handles: Vec<_> = (0..n)
        .map(|pe| {
            let sim = Arc::clone(sim);
            let f = Arc::clone(&f);
            std::thread::spawn(move || {
                let t = sim.handle_for(Pe::new(pe));
                let team = Team::world(n, Pe::new(pe), barrier_psync, collective_psync);
                f(pe, &team, &t);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

fn bench_barrier(c: &mut Criterion) {
    let mut group = c.benchmark_group("barrier");
    for &n in &PE_COUNTS {
        for (label, algo) in [
            ("linear", BarrierAlgorithm::Linear),
            ("binomial_tree", BarrierAlgorithm::Binomial),
            ("dissemination", BarrierAlgorithm::Dissemination),
        ] {
            group.bench_with_input(BenchmarkId::new(label, n), &n, |b, &n| {
                let (sim, barrier_psync, collective_psync, _payload) = new_cluster(n, 0);
                b.iter(|| {
                    run_on_every_pe(&sim, n, barrier_psync, collective_psync, move |_pe, team, t| {
                        barrier::synchronize(team, t, algo, 2, true).unwrap();
                    });
                });
            });
        }
    }
    group.finish();
}

fn bench_reduce(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce_sum_i32");
    for &n in &PE_COUNTS {
        for nreduce in [1usize, 64, 1024] {
            group.throughput(Throughput::Bytes((nreduce * 4) as u64));
            group.bench_with_input(BenchmarkId::new(format!("pes={n}"), nreduce), &nreduce, |b, &nreduce| {
                let (sim, barrier_psync, collective_psync, payload) = new_cluster(n, nreduce * 4);
                b.iter(|| {
                    run_on_every_pe(&sim, n, barrier_psync, collective_psync, move |_pe, team, t| {
                        let src: Vec<u8> = (0..nreduce).flat_map(|_| 1i32.to_le_bytes()).collect();
                        reduce::reduce(team, t, ReduceAlgorithm::Binomial, ReduceOp::Sum, ReduceKind::I32, payload, &src, nreduce)
                            .unwrap();
                    });
                    black_box(());
                });
            });
        }
    }
    group.finish();
}

fn bench_alltoall(c: &mut Criterion) {
    use oshmem::collectives::algorithm::{AlltoallAlgorithm, AlltoallSchedule, Completion};
    let algo = AlltoallAlgorithm { schedule: AlltoallSchedule::ShiftExchange, completion: Completion::Barrier };

    let mut group = c.benchmark_group("alltoall_shift_exchange_barrier");
    for &n in &PE_COUNTS {
        for block_len in [8usize, 256] {
            group.throughput(Throughput::Bytes((block_len * n as usize) as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("pes={n}"), block_len),
                &block_len,
                |b, &block_len| {
                    let (sim, barrier_psync, collective_psync, payload) = new_cluster(n, block_len * n as usize);
                    b.iter(|| {
                        run_on_every_pe(&sim, n, barrier_psync, collective_psync, move |pe, team, t| {
                            let src = vec![pe as u8; block_len * team.nranks as usize];
                            alltoall::alltoall(team, t, algo, payload, block_len, &src).unwrap();
                        });
                        black_box(());
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_reduce_algorithms(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce_algorithm_comparison_pes=8_n=256");
    let n = 8;
    let nreduce = 256usize;
    for (label, algo) in [
        ("linear", ReduceAlgorithm::Linear),
        ("binomial", ReduceAlgorithm::Binomial),
        ("recursive_doubling", ReduceAlgorithm::RecursiveDoubling),
        ("rabenseifner", ReduceAlgorithm::Rabenseifner),
        ("rabenseifner2", ReduceAlgorithm::Rabenseifner2),
    ] {
        group.bench_function(label, |b| {
            let (sim, barrier_psync, collective_psync, payload) = new_cluster(n, nreduce * 4);
            b.iter(|| {
                run_on_every_pe(&sim, n, barrier_psync, collective_psync, move |_pe, team, t| {
                    let src: Vec<u8> = (0..nreduce).flat_map(|_| 1i32.to_le_bytes()).collect();
                    reduce::reduce(team, t, algo, ReduceOp::Sum, ReduceKind::I32, payload, &src, nreduce).unwrap();
                });
                black_box(());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_barrier, bench_reduce, bench_alltoall, bench_reduce_algorithms);
criterion_main!(benches);
