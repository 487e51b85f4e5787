//! `sim-transport` feature: wires [`oshmem_transport_sim::SimCluster`] up
//! to this crate's own [`Transport`] trait. PEs are OS threads sharing
//! one process; each named heap becomes one `SimCluster` heap, shared
//! by every PE's handle. Existing purely so tests (and single-machine
//! examples) have a working `Transport` without a real network layer —
//! production deployments bring their own.

use crate::error::{OshmemError, Result};
use crate::pe::Pe;
use crate::transport::{AmoOp, Cmp, SignalOp, SymAddr, Transport};
use oshmem_transport_sim::SimCluster;
use std::sync::Arc;

/// Owns the shared simulated cluster; cheap to clone, cheap to hand a
/// per-PE [`SimHandle`] out of.
pub struct SimTransport {
    cluster: Arc<SimCluster>,
}

impl SimTransport {
    /// Reserves heap index 0 for [`crate::engine::Engine`]'s internal
    /// pSync arrays before returning, so `Engine::init` can assume it
    /// already exists the way a real transport's pre-mapped symmetric
    /// heap would. Any heaps callers register afterwards start at index 1.
    pub fn new(n_pes: u32) -> Self {
        let cluster = SimCluster::new(n_pes);
        let psync_heap = cluster.register_heap(crate::engine::PSYNC_HEAP_CAPACITY);
        debug_assert_eq!(psync_heap, 0, "pSync heap must be the first heap registered");
        SimTransport { cluster: Arc::new(cluster) }
    }

    /// Allocates a new zeroed heap of `capacity` bytes on every PE,
    /// returning its dense heap index (index 0 is always the pSync heap
    /// reserved by `new`; the first caller-registered heap gets index 1,
    /// matching [`crate::heap::Registry::name_to_index`] ordering when
    /// callers register heaps in the same order on every PE).
    pub fn register_heap(&self, capacity: usize) -> u32 {
        self.cluster.register_heap(capacity)
    }

    /// A `Transport` acting as PE `pe` against this shared cluster.
    pub fn handle_for(&self, pe: Pe) -> SimHandle {
        SimHandle { cluster: Arc::clone(&self.cluster), me: pe }
    }
}

/// A single PE's view of a [`SimTransport`].
pub struct SimHandle {
    cluster: Arc<SimCluster>,
    me: Pe,
}

fn apply(op: AmoOp, old: u64) -> u64 {
    match op {
        AmoOp::Set(v) => v,
        AmoOp::Swap(v) => v,
        AmoOp::CompareSwap { expected, new } => {
            if old == expected { new } else { old }
        }
        AmoOp::Add(v) => old.wrapping_add(v),
        AmoOp::Inc => old.wrapping_add(1),
        AmoOp::And(v) => old & v,
        AmoOp::Or(v) => old | v,
        AmoOp::Xor(v) => old ^ v,
    }
}

impl Transport for SimHandle {
    fn n_pes(&self) -> u32 {
        self.cluster.n_ranks()
    }

    fn my_pe(&self) -> Pe {
        self.me
    }

    fn put(&self, dst: SymAddr, src: &[u8], pe: Pe) -> Result<()> {
        self.cluster.write(dst.heap_index, pe.as_u32(), dst.offset, src);
        Ok(())
    }

    fn get(&self, dst: &mut [u8], src: SymAddr, pe: Pe) -> Result<()> {
        self.cluster.read(src.heap_index, pe.as_u32(), src.offset, dst);
        Ok(())
    }

    fn put_signal(
        &self,
        dst: SymAddr,
        src: &[u8],
        sig_addr: SymAddr,
        signal_value: u64,
        sig_op: SignalOp,
        pe: Pe,
    ) -> Result<()> {
        self.put(dst, src, pe)?;
        let op = match sig_op {
            SignalOp::Set => AmoOp::Set(signal_value),
            SignalOp::Add => AmoOp::Add(signal_value),
        };
        self.amo(sig_addr, op, pe)?;
        Ok(())
    }

    fn amo(&self, addr: SymAddr, op: AmoOp, pe: Pe) -> Result<u64> {
        if addr.heap_index as usize >= usize::MAX {
            return Err(OshmemError::InvalidArgument("heap index overflow".into()));
        }
        Ok(self.cluster.amo_u64(addr.heap_index, pe.as_u32(), addr.offset, |old| apply(op, old)))
    }

    fn quiet(&self) -> Result<()> {
        Ok(())
    }

    fn fence(&self) -> Result<()> {
        Ok(())
    }

    fn progress(&self) {
        std::thread::yield_now();
    }

    fn wait_until(&self, addr: SymAddr, cmp: Cmp, value: u64) {
        loop {
            if self.test(addr, cmp, value) {
                return;
            }
            self.progress();
        }
    }

    fn test(&self, addr: SymAddr, cmp: Cmp, value: u64) -> bool {
        let observed = self
            .cluster
            .amo_u64(addr.heap_index, self.me.as_u32(), addr.offset, |old| old);
        cmp.eval(observed, value)
    }

    fn team_barrier(&self, members: &[Pe]) {
        debug_assert!(
            members.contains(&self.me),
            "team_barrier called by a PE not in the member list"
        );
        self.cluster.sync();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_round_trips_across_pes() {
        let sim = SimTransport::new(2);
        let heap = sim.register_heap(64);
        let writer = sim.handle_for(Pe::new(0));
        let reader = sim.handle_for(Pe::new(1));

        writer.put(SymAddr::new(heap, 0), &[1, 2, 3, 4], Pe::new(1)).unwrap();
        let mut out = [0u8; 4];
        reader.get(&mut out, SymAddr::new(heap, 0), Pe::new(1)).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn amo_compare_swap_only_swaps_on_match() {
        let sim = SimTransport::new(1);
        let heap = sim.register_heap(64);
        let t = sim.handle_for(Pe::new(0));
        let addr = SymAddr::new(heap, 0);

        t.amo(addr, AmoOp::Set(5), Pe::new(0)).unwrap();
        let before = t
            .amo(addr, AmoOp::CompareSwap { expected: 99, new: 1 }, Pe::new(0))
            .unwrap();
        assert_eq!(before, 5);
        assert_eq!(t.amo(addr, AmoOp::Add(0), Pe::new(0)).unwrap(), 5);

        let before = t
            .amo(addr, AmoOp::CompareSwap { expected: 5, new: 42 }, Pe::new(0))
            .unwrap();
        assert_eq!(before, 5);
        assert_eq!(t.amo(addr, AmoOp::Add(0), Pe::new(0)).unwrap(), 42);
    }

    #[test]
    fn wait_until_observes_a_concurrent_set() {
        let sim = std::sync::Arc::new(SimTransport::new(1));
        let heap = sim.register_heap(64);
        let addr = SymAddr::new(heap, 0);
        let setter = sim.handle_for(Pe::new(0));
        setter.amo(addr, AmoOp::Set(0), Pe::new(0)).unwrap();

        let sim2 = std::sync::Arc::clone(&sim);
        let writer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            sim2.handle_for(Pe::new(0)).amo(addr, AmoOp::Set(7), Pe::new(0)).unwrap();
        });
        let reader = sim.handle_for(Pe::new(0));
        reader.wait_until(addr, Cmp::Eq, 7);
        writer.join().unwrap();
    }

    #[test]
    fn team_barrier_releases_all_members() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let sim = std::sync::Arc::new(SimTransport::new(4));
        let done = std::sync::Arc::new(AtomicUsize::new(0));
        let members: Vec<Pe> = (0..4).map(Pe::new).collect();

        let handles: Vec<_> = (0..4)
            .map(|pe| {
                let sim = std::sync::Arc::clone(&sim);
                let done = std::sync::Arc::clone(&done);
                let members = members.clone();
                std::thread::spawn(move || {
                    let t = sim.handle_for(Pe::new(pe));
                    t.team_barrier(&members);
                    done.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }
}
