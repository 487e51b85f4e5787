//! The collective operations engine (spec §4.3): seven families, each
//! with several selectable algorithms operating over a common
//! `(team, transport)` substrate.
//!
//! [`DispatchRecord`] is the spec's "global mapping from collective
//! family -> algorithm" (§3), parsed once at init (§9: "prefer a closed
//! sum type over string lookup in a rewrite — parse the configured name
//! once at init into the variant"). Each family module's public
//! function validates its arguments (§4.3.1), then matches on the
//! resolved enum and calls the chosen algorithm.

pub mod algorithm;
pub mod alltoall;
pub mod barrier;
pub mod broadcast;
pub mod collect;
pub mod fcollect;
pub mod reduce;

use crate::config::Config;
use crate::error::{OshmemError, Result};
use crate::team::{PSYNC_WORDS, Team};
use crate::transport::{SymAddr, Transport};
use algorithm::{
    AlltoallAlgorithm, AlltoallsAlgorithm, BarrierAlgorithm, BroadcastAlgorithm, CollectAlgorithm,
    FcollectAlgorithm, ReduceAlgorithm, ReduceOp,
};
use reduce::ReduceKind;

/// Populated once at `Engine::init`, immutable after (spec §3).
pub struct DispatchRecord {
    pub barrier: BarrierAlgorithm,
    pub sync: BarrierAlgorithm,
    pub broadcast: BroadcastAlgorithm,
    pub collect: CollectAlgorithm,
    pub fcollect: FcollectAlgorithm,
    pub alltoall: AlltoallAlgorithm,
    pub alltoalls: AlltoallsAlgorithm,
    pub reduce: ReduceAlgorithm,
    pub tree_radix: u32,
}

impl DispatchRecord {
    pub fn build(cfg: &Config) -> Result<Self> {
        Ok(DispatchRecord {
            barrier: BarrierAlgorithm::parse(&cfg.barrier_algorithm)?,
            sync: BarrierAlgorithm::parse(&cfg.sync_algorithm)?,
            broadcast: BroadcastAlgorithm::parse(&cfg.broadcast_algorithm)?,
            collect: CollectAlgorithm::parse(&cfg.collect_algorithm)?,
            fcollect: FcollectAlgorithm::parse(&cfg.fcollect_algorithm)?,
            alltoall: AlltoallAlgorithm::parse(&cfg.alltoall_algorithm)?,
            alltoalls: AlltoallsAlgorithm::parse(&cfg.alltoalls_algorithm)?,
            reduce: ReduceAlgorithm::parse(&cfg.reduce_algorithm)?,
            tree_radix: cfg.tree_radix,
        })
    }
}

/// Common precondition check shared by every family (spec §4.3.1):
/// library initialized (implied by holding an `Engine`/team), team
/// valid, and `nranks > 0`.
pub(crate) fn check_team(nranks: u32) -> Result<()> {
    if nranks == 0 {
        return Err(crate::error::OshmemError::InvalidArgument("team has zero ranks".into()));
    }
    Ok(())
}

/// Spec §4.3.1's "no overlap between source and destination ranges",
/// specialized to what's actually checkable here: every `put`/`get` on
/// this crate's `Transport` copies bytes in and out rather than handing
/// out a raw pointer, so a caller's local `src`/`dest` slices can never
/// alias the transport's own backing storage — the one range a caller
/// *can* accidentally collide with is the team's own pSync scratch,
/// which several algorithms (`collect`, `alltoall`'s deferred-completion
/// word) read and write as working state over the course of the call.
/// Landing a user buffer on top of that would corrupt synchronization
/// state mid-collective, not just application data.
pub(crate) fn check_no_overlap(team: &Team, addr: SymAddr, len: usize) -> Result<()> {
    let psync_span = PSYNC_WORDS * 8;
    let collides = |psync: SymAddr| {
        psync.heap_index == addr.heap_index
            && addr.offset < psync.offset + psync_span
            && psync.offset < addr.offset + len
    };
    if collides(team.barrier_psync) || collides(team.collective_psync) {
        return Err(OshmemError::InvalidArgument(
            "destination range overlaps the team's pSync scratch space".into(),
        ));
    }
    Ok(())
}

/// A plain dissemination sync on the team's `barrier_psync` (spec §3:
/// pSync buffers are per-purpose, not per-call, so nesting this inside
/// a single in-flight collective — never two concurrent ones — is
/// within the "one collective at a time per team" contract). Multi-round
/// algorithms (ring/Bruck/recursive-doubling/neighbor-exchange) call
/// this between rounds so a fast PE can never start round `r+1` before
/// every peer's round-`r` put has landed.
pub(crate) fn round_barrier(team: &crate::team::Team, t: &dyn crate::transport::Transport) -> Result<()> {
    crate::stat_inc!(collective_rounds);
    barrier::synchronize(team, t, algorithm::BarrierAlgorithm::Dissemination, 2, false)
}

/// Binds a transport and a resolved [`DispatchRecord`] so callers pass
/// only `(team, buffers)` at each call site — the facade named in this
/// crate's top-level usage example (spec §9: "public entry points
/// borrow" the engine's resolved state, not re-resolve it per call).
pub struct CollectiveOps<'a, T: Transport> {
    t: &'a T,
    dispatch: &'a DispatchRecord,
}

impl<'a, T: Transport> CollectiveOps<'a, T> {
    pub fn new(t: &'a T, dispatch: &'a DispatchRecord) -> Self {
        CollectiveOps { t, dispatch }
    }

    pub fn barrier(&self, team: &Team) -> Result<()> {
        crate::stat_inc!(collective_calls);
        barrier::synchronize(team, self.t, self.dispatch.barrier, self.dispatch.tree_radix, true)
    }

    pub fn sync(&self, team: &Team) -> Result<()> {
        crate::stat_inc!(collective_calls);
        barrier::synchronize(team, self.t, self.dispatch.sync, self.dispatch.tree_radix, false)
    }

    pub fn broadcast(&self, team: &Team, dest: SymAddr, dest_len: usize, src: &[u8], root: u32) -> Result<()> {
        crate::stat_inc!(collective_calls);
        broadcast::broadcast(team, self.t, self.dispatch.broadcast, self.dispatch.tree_radix, dest, dest_len, src, root)
    }

    pub fn collect(&self, team: &Team, dest: SymAddr, src: &[u8]) -> Result<usize> {
        crate::stat_inc!(collective_calls);
        collect::collect(team, self.t, self.dispatch.collect, dest, src)
    }

    pub fn fcollect(&self, team: &Team, dest: SymAddr, per_pe_len: usize, src: &[u8]) -> Result<()> {
        crate::stat_inc!(collective_calls);
        fcollect::fcollect(team, self.t, self.dispatch.fcollect, dest, per_pe_len, src)
    }

    pub fn alltoall(&self, team: &Team, dest: SymAddr, block_len: usize, src: &[u8]) -> Result<()> {
        crate::stat_inc!(collective_calls);
        alltoall::alltoall(team, self.t, self.dispatch.alltoall, dest, block_len, src)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn alltoalls(
        &self,
        team: &Team,
        dest: SymAddr,
        dest_stride: usize,
        src: &[u8],
        src_stride: usize,
        elem_size: usize,
        nelems: usize,
    ) -> Result<()> {
        crate::stat_inc!(collective_calls);
        alltoall::alltoalls(team, self.t, self.dispatch.alltoalls, dest, dest_stride, src, src_stride, elem_size, nelems)
    }

    pub fn reduce(&self, team: &Team, op: ReduceOp, kind: ReduceKind, dest: SymAddr, src: &[u8], nreduce: usize) -> Result<()> {
        crate::stat_inc!(collective_calls);
        reduce::reduce(team, self.t, self.dispatch.reduce, op, kind, dest, src, nreduce)
    }
}
