//! `oshmem-transport-sim` — in-process shared-memory primitives for
//! testing PGAS transports without a real network fabric.
//!
//! This crate knows nothing about PEs, symmetric addresses, or the
//! `Transport` trait; it only provides a cluster of independent byte
//! buffers (one per simulated rank per registered heap) plus raw
//! word-granular read/write/read-modify-write and a reusable barrier.
//! A higher layer (the `oshmem` crate's `sim-transport` feature) wraps
//! these primitives behind its own `Transport` implementation — the
//! same relationship `rseq` has to `rtmalloc`: low-level mechanism
//! down here, policy and trait surface up there.

pub mod barrier;
pub mod cluster;

pub use barrier::CyclicBarrier;
pub use cluster::{HeapId, SimCluster};
