//! Barrier / Sync family (spec §4.3.2). `barrier` additionally quiets
//! this PE's outstanding one-sided operations before any signal another
//! PE treats as a completion event (spec §9 Design Notes, resolving the
//! "fence placement" open question in favor of *always* quieting before
//! a completion signal); `sync` runs the identical algorithm without
//! that quiet.

use super::algorithm::BarrierAlgorithm;
use crate::error::Result;
use crate::team::{SYNC_VALUE, Team};
use crate::transport::{AmoOp, Cmp, SymAddr, Transport};

const ARRIVE_WORD: usize = 0;
const RELEASE_WORD: usize = 1;
const RELEASED_MARKER: u64 = SYNC_VALUE.wrapping_sub(1);

fn word_addr(base: SymAddr, word: usize) -> SymAddr {
    base.plus(word * 8)
}

fn maybe_quiet(t: &dyn Transport, quiet_before_signal: bool) -> Result<()> {
    if quiet_before_signal { t.quiet() } else { Ok(()) }
}

/// Shared entry point for both `barrier` (`quiet_before_signal = true`)
/// and `sync` (`quiet_before_signal = false`).
pub fn synchronize(
    team: &Team,
    t: &dyn Transport,
    algorithm: BarrierAlgorithm,
    tree_radix: u32,
    quiet_before_signal: bool,
) -> Result<()> {
    super::check_team(team.nranks)?;
    let rank = team.rank.expect("caller must be a team member");
    if team.nranks == 1 {
        return Ok(());
    }

    match algorithm {
        BarrierAlgorithm::Linear => linear(team, t, rank, quiet_before_signal),
        BarrierAlgorithm::CompleteTree => {
            let parent = crate::tree::complete_tree_parent(rank, 0, team.nranks, tree_radix);
            let children = crate::tree::complete_tree_children(rank, 0, team.nranks, tree_radix);
            tree(team, t, rank, parent, children, quiet_before_signal)
        }
        BarrierAlgorithm::Binomial => {
            let parent = crate::tree::knomial_parent(rank, 0, team.nranks, 2);
            let children = crate::tree::knomial_children(rank, 0, team.nranks, 2);
            tree(team, t, rank, parent, children, quiet_before_signal)
        }
        BarrierAlgorithm::KNomial => {
            let parent = crate::tree::knomial_parent(rank, 0, team.nranks, tree_radix);
            let children = crate::tree::knomial_children(rank, 0, team.nranks, tree_radix);
            tree(team, t, rank, parent, children, quiet_before_signal)
        }
        BarrierAlgorithm::Dissemination => dissemination(team, t, rank, quiet_before_signal),
    }
}

fn linear(team: &Team, t: &dyn Transport, rank: u32, quiet_before_signal: bool) -> Result<()> {
    if rank == 0 {
        let target = SYNC_VALUE.wrapping_add(team.nranks as u64 - 1);
        t.wait_until(word_addr(team.barrier_psync, ARRIVE_WORD), Cmp::Eq, target);
        t.amo(word_addr(team.barrier_psync, ARRIVE_WORD), AmoOp::Set(SYNC_VALUE), t.my_pe())?;
        maybe_quiet(t, quiet_before_signal)?;
        for r in 1..team.nranks {
            let pe = team.global_pe(r).expect("rank < nranks");
            t.amo(word_addr(team.barrier_psync, RELEASE_WORD), AmoOp::Set(RELEASED_MARKER), pe)?;
        }
    } else {
        let root = team.global_pe(0).expect("team has rank 0");
        maybe_quiet(t, quiet_before_signal)?;
        t.amo(word_addr(team.barrier_psync, ARRIVE_WORD), AmoOp::Add(1), root)?;
        t.wait_until(word_addr(team.barrier_psync, RELEASE_WORD), Cmp::Ne, SYNC_VALUE);
        t.amo(word_addr(team.barrier_psync, RELEASE_WORD), AmoOp::Set(SYNC_VALUE), t.my_pe())?;
    }
    Ok(())
}

fn tree(
    team: &Team,
    t: &dyn Transport,
    rank: u32,
    parent: Option<u32>,
    children: Vec<u32>,
    quiet_before_signal: bool,
) -> Result<()> {
    if !children.is_empty() {
        let target = SYNC_VALUE.wrapping_add(children.len() as u64);
        t.wait_until(word_addr(team.barrier_psync, ARRIVE_WORD), Cmp::Eq, target);
        t.amo(word_addr(team.barrier_psync, ARRIVE_WORD), AmoOp::Set(SYNC_VALUE), t.my_pe())?;
    }

    if let Some(p) = parent {
        let parent_pe = team.global_pe(p).expect("parent rank < nranks");
        maybe_quiet(t, quiet_before_signal)?;
        t.amo(word_addr(team.barrier_psync, ARRIVE_WORD), AmoOp::Add(1), parent_pe)?;
        t.wait_until(word_addr(team.barrier_psync, RELEASE_WORD), Cmp::Ne, SYNC_VALUE);
        t.amo(word_addr(team.barrier_psync, RELEASE_WORD), AmoOp::Set(SYNC_VALUE), t.my_pe())?;
    }

    maybe_quiet(t, quiet_before_signal)?;
    for c in children {
        let child_pe = team.global_pe(c).expect("child rank < nranks");
        t.amo(word_addr(team.barrier_psync, RELEASE_WORD), AmoOp::Set(RELEASED_MARKER), child_pe)?;
    }
    let _ = rank;
    Ok(())
}

fn dissemination(team: &Team, t: &dyn Transport, rank: u32, quiet_before_signal: bool) -> Result<()> {
    let rounds = crate::tree::dissemination_rounds(team.nranks);
    for r in 0..rounds {
        let partner_rank = crate::tree::dissemination_partner(rank, team.nranks, r);
        let partner_pe = team.global_pe(partner_rank).expect("partner rank < nranks");
        maybe_quiet(t, quiet_before_signal)?;
        t.amo(word_addr(team.barrier_psync, r as usize), AmoOp::Set(RELEASED_MARKER), partner_pe)?;
        t.wait_until(word_addr(team.barrier_psync, r as usize), Cmp::Ne, SYNC_VALUE);
    }
    for r in 0..rounds {
        t.amo(word_addr(team.barrier_psync, r as usize), AmoOp::Set(SYNC_VALUE), t.my_pe())?;
    }
    Ok(())
}
