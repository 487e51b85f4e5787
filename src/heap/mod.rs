//! Symmetric heap: a bounded-region allocator plus a multi-heap registry
//! (spec §4.1).
//!
//! Every PE carries an array of [`allocator::Heap`] instances, indexed by
//! the dense integer [`registry::Registry`] assigns to a heap's name. The
//! base address and capacity of heap `i` are identical across every PE —
//! that symmetry is the caller's responsibility (typically: all PEs agree
//! on `(base, capacity)` out of band, e.g. via a collective, before
//! `init`); this module only guarantees the *local* allocator contract.

pub mod allocator;
pub mod registry;

pub use allocator::{Heap, HeapError};
pub use registry::Registry;
