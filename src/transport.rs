//! The external transport capability (spec §6) — consumed, not implemented,
//! by this crate. A real OpenSHMEM deployment backs this with a network
//! layer (libfabric, UCX, a vendor interconnect API); the `sim-transport`
//! feature wires up [`oshmem_transport_sim`], an in-process reference
//! implementation for tests and single-machine use.
//!
//! Every operation is addressed by `(target PE, symmetric address)`. A
//! symmetric address is represented as `(heap_index, offset)` rather than a
//! raw pointer (Design Notes, spec §9): it composes directly with the
//! multi-heap registry of §4.1 and never requires a transport to dereference
//! a foreign process's raw address space.

use crate::error::Result;
use crate::pe::Pe;

/// A symmetric address: byte `offset` within heap `heap_index`, valid on
/// every PE (spec §3, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymAddr {
    pub heap_index: u32,
    pub offset: usize,
}

impl SymAddr {
    pub const fn new(heap_index: u32, offset: usize) -> Self {
        SymAddr { heap_index, offset }
    }

    pub fn plus(self, bytes: usize) -> Self {
        SymAddr { offset: self.offset + bytes, ..self }
    }
}

/// `sig_op` for `put_signal` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOp {
    Set,
    Add,
}

/// `cmp` for `wait_until`/`test_*` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    pub fn eval(self, observed: u64, value: u64) -> bool {
        match self {
            Cmp::Eq => observed == value,
            Cmp::Ne => observed != value,
            Cmp::Lt => observed < value,
            Cmp::Le => observed <= value,
            Cmp::Gt => observed > value,
            Cmp::Ge => observed >= value,
        }
    }
}

/// An atomic memory operation against a remote 64-bit word (spec §6). The
/// fetching variants return the word's value *before* the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmoOp {
    Set(u64),
    Swap(u64),
    CompareSwap { expected: u64, new: u64 },
    Add(u64),
    Inc,
    And(u64),
    Or(u64),
    Xor(u64),
}

/// The one-sided communication and synchronization capability this crate
/// is generic over. Implementors are addressed per-PE; every method acts
/// on the PE named by its `pe` parameter (or, for local ops, the caller's
/// own symmetric heap).
pub trait Transport: Send + Sync {
    /// Number of PEs in the job. Stable for the process lifetime.
    fn n_pes(&self) -> u32;

    /// This process's PE number.
    fn my_pe(&self) -> Pe;

    fn put(&self, dst: SymAddr, src: &[u8], pe: Pe) -> Result<()>;
    fn get(&self, dst: &mut [u8], src: SymAddr, pe: Pe) -> Result<()>;

    /// Non-blocking initiate; completion is tracked by `quiet`.
    fn put_nbi(&self, dst: SymAddr, src: &[u8], pe: Pe) -> Result<()> {
        self.put(dst, src, pe)
    }
    fn get_nbi(&self, dst: &mut [u8], src: SymAddr, pe: Pe) -> Result<()> {
        self.get(dst, src, pe)
    }

    fn put_signal(
        &self,
        dst: SymAddr,
        src: &[u8],
        sig_addr: SymAddr,
        signal_value: u64,
        sig_op: SignalOp,
        pe: Pe,
    ) -> Result<()>;
    fn put_signal_nbi(
        &self,
        dst: SymAddr,
        src: &[u8],
        sig_addr: SymAddr,
        signal_value: u64,
        sig_op: SignalOp,
        pe: Pe,
    ) -> Result<()> {
        self.put_signal(dst, src, sig_addr, signal_value, sig_op, pe)
    }

    /// Applies `op` to the 64-bit word at `addr` on `pe`, returning the
    /// value observed before the operation (ignored by non-fetching
    /// callers).
    fn amo(&self, addr: SymAddr, op: AmoOp, pe: Pe) -> Result<u64>;

    /// Completes all outstanding one-sided ops this PE has initiated.
    fn quiet(&self) -> Result<()>;

    /// Orders put/get issued by this PE to the same `(pe, addr)` pair.
    fn fence(&self) -> Result<()>;

    /// Drains incoming AMOs/puts so a remote peer's operations against
    /// this PE make progress while this PE is otherwise spinning.
    fn progress(&self);

    /// Blocks until the 64-bit word at the *local* `addr` satisfies
    /// `cmp(word, value)`, calling `progress()` between polls.
    fn wait_until(&self, addr: SymAddr, cmp: Cmp, value: u64);

    /// Non-blocking poll of the same condition as `wait_until`.
    fn test(&self, addr: SymAddr, cmp: Cmp, value: u64) -> bool;

    /// Team-wide synchronization barrier at the transport level (distinct
    /// from the library's own collective `barrier`, which is built out of
    /// these primitives — some transports offer a hardware-accelerated
    /// barrier the engine may opt into for `WORLD`).
    fn team_barrier(&self, members: &[Pe]);
}
