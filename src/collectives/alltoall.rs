//! All-to-all family (spec §4.3.5): personalized exchange where every
//! PE sends a distinct block to every other PE. Three pairwise-exchange
//! schedules (which partner each round) cross three completion
//! protocols (how a receiver knows its incoming blocks have all
//! landed) — schedule and completion are independent axes, matching
//! the config's `"<schedule>_<completion>"` naming (`algorithm.rs`).
//!
//! `alltoalls` is the strided sibling: same schedules and completions,
//! but each per-destination block is `nelems` elements spaced by a
//! stride instead of one contiguous run of bytes.

use super::algorithm::{AlltoallAlgorithm, AlltoallSchedule, Completion};
use crate::error::{OshmemError, Result};
use crate::team::{SYNC_VALUE, Team};
use crate::transport::{AmoOp, Cmp, SignalOp, SymAddr, Transport};

const COMPLETION_WORD: usize = 0;

fn validate(team: &Team, algorithm: AlltoallAlgorithm, dest: SymAddr, dest_len: usize) -> Result<()> {
    super::check_team(team.nranks)?;
    super::check_no_overlap(team, dest, dest_len)?;
    if algorithm.requires_power_of_two() && !team.nranks.is_power_of_two() {
        return Err(OshmemError::InvalidArgument(format!(
            "{:?} requires a power-of-two team size, got {}",
            algorithm.schedule, team.nranks
        )));
    }
    if algorithm.requires_even_nranks() && team.nranks % 2 != 0 {
        return Err(OshmemError::InvalidArgument(format!(
            "{:?} requires an even team size, got {}",
            algorithm.schedule, team.nranks
        )));
    }
    Ok(())
}

/// `partners[r]` is who this rank exchanges with in round `r`, or
/// `None` if this rank sits out the round (only possible for
/// `ColorPairwiseExchange` with an odd team size, spec §4.3.5).
fn schedule_partners(schedule: AlltoallSchedule, rank: u32, nranks: u32) -> Vec<Option<u32>> {
    match schedule {
        AlltoallSchedule::ShiftExchange => (1..nranks).map(|r| Some((rank + r) % nranks)).collect(),
        AlltoallSchedule::XorPairwiseExchange => (1..nranks).map(|r| Some(rank ^ r)).collect(),
        AlltoallSchedule::ColorPairwiseExchange => {
            let rounds = crate::tree::edge_color_rounds(nranks);
            (0..rounds).map(|r| crate::tree::edge_color_partner(rank, nranks, r)).collect()
        }
    }
}

/// `Barrier` completion resyncs every PE before the next round;
/// `Counter` and `Signal` let rounds overlap and only block once, on an
/// expected arrival tally, after the whole schedule has been sent.
fn finish_deferred(team: &Team, t: &dyn Transport, completion: Completion, expected: u64) -> Result<()> {
    if completion == Completion::Barrier {
        return Ok(());
    }
    let addr = team.collective_psync.plus(COMPLETION_WORD * 8);
    t.wait_until(addr, Cmp::Eq, SYNC_VALUE.wrapping_add(expected));
    super::round_barrier(team, t)?;
    t.amo(addr, AmoOp::Set(SYNC_VALUE), t.my_pe())?;
    super::round_barrier(team, t)
}

pub fn alltoall(
    team: &Team,
    t: &dyn Transport,
    algorithm: AlltoallAlgorithm,
    dest: SymAddr,
    block_len: usize,
    src: &[u8],
) -> Result<()> {
    let n = team.nranks;
    validate(team, algorithm, dest, n as usize * block_len)?;
    let rank = team.rank.expect("caller must be a team member");
    if src.len() != n as usize * block_len {
        return Err(OshmemError::InvalidArgument("src must hold one block per PE".into()));
    }

    // Seed the block addressed to myself directly.
    let my_block = &src[rank as usize * block_len..(rank as usize + 1) * block_len];
    t.put(dest.plus(rank as usize * block_len), my_block, t.my_pe())?;
    if n == 1 {
        return Ok(());
    }

    let partners = schedule_partners(algorithm.schedule, rank, n);
    let completion_addr = team.collective_psync.plus(COMPLETION_WORD * 8);

    for partner in partners {
        let Some(partner_rank) = partner else { continue };
        let partner_pe = team.global_pe(partner_rank).expect("schedule partner in range");
        let block = &src[partner_rank as usize * block_len..(partner_rank as usize + 1) * block_len];
        let target = dest.plus(rank as usize * block_len);
        match algorithm.completion {
            Completion::Barrier => {
                t.put(target, block, partner_pe)?;
                t.quiet()?;
                super::round_barrier(team, t)?;
            }
            Completion::Counter => {
                t.put(target, block, partner_pe)?;
                t.quiet()?;
                t.amo(completion_addr, AmoOp::Add(1), partner_pe)?;
            }
            Completion::Signal => {
                t.put_signal(target, block, completion_addr, 1, SignalOp::Add, partner_pe)?;
            }
        }
    }

    if algorithm.completion != Completion::Barrier {
        let expected = (0..n).filter(|&r| r != rank).count() as u64;
        finish_deferred(team, t, algorithm.completion, expected)?;
    } else {
        super::round_barrier(team, t)?;
    }
    Ok(())
}

fn gather_strided(buf: &[u8], start_elem: usize, stride_elems: usize, elem_size: usize, nelems: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(nelems * elem_size);
    for i in 0..nelems {
        let off = (start_elem + i * stride_elems) * elem_size;
        out.extend_from_slice(&buf[off..off + elem_size]);
    }
    out
}

/// Strided all-to-all (spec §4.3.5): the block bound for rank `r` sits
/// at element offset `r * nelems * src_stride` in `src`, read with a
/// stride of `src_stride` elements; the matching receive slot in
/// `dest` sits at `my_rank * nelems * dest_stride`, with elements
/// `dest_stride` apart. `dest_stride == 1` and `src_stride == 1`
/// degenerates to contiguous blocks, identical to `alltoall`.
pub fn alltoalls(
    team: &Team,
    t: &dyn Transport,
    algorithm: AlltoallAlgorithm,
    dest: SymAddr,
    dest_stride: usize,
    src: &[u8],
    src_stride: usize,
    elem_size: usize,
    nelems: usize,
) -> Result<()> {
    let rank = team.rank.expect("caller must be a team member");
    let n = team.nranks;
    let dest_span = n as usize * nelems * dest_stride.max(1) * elem_size;
    validate(team, algorithm, dest, dest_span)?;
    let src_block_span = nelems * src_stride.max(1) * elem_size;
    if src.len() < n as usize * src_block_span {
        return Err(OshmemError::InvalidArgument("src too small for nelems/stride".into()));
    }

    let write_strided = |t: &dyn Transport, payload: &[u8], base: SymAddr, pe: crate::pe::Pe| -> Result<()> {
        if dest_stride <= 1 {
            t.put(base, payload, pe)
        } else {
            for i in 0..nelems {
                let off = i * elem_size;
                t.put(base.plus(i * dest_stride * elem_size), &payload[off..off + elem_size], pe)?;
            }
            Ok(())
        }
    };

    let my_payload = gather_strided(src, rank as usize * nelems * src_stride.max(1), src_stride.max(1), elem_size, nelems);
    write_strided(t, &my_payload, dest.plus(rank as usize * nelems * dest_stride.max(1) * elem_size), t.my_pe())?;
    if n == 1 {
        return Ok(());
    }

    let partners = schedule_partners(algorithm.schedule, rank, n);
    let completion_addr = team.collective_psync.plus(COMPLETION_WORD * 8);

    for partner in partners {
        let Some(partner_rank) = partner else { continue };
        let partner_pe = team.global_pe(partner_rank).expect("schedule partner in range");
        let payload = gather_strided(src, partner_rank as usize * nelems * src_stride.max(1), src_stride.max(1), elem_size, nelems);
        let target = dest.plus(rank as usize * nelems * dest_stride.max(1) * elem_size);
        match algorithm.completion {
            Completion::Barrier => {
                write_strided(t, &payload, target, partner_pe)?;
                t.quiet()?;
                super::round_barrier(team, t)?;
            }
            Completion::Counter => {
                write_strided(t, &payload, target, partner_pe)?;
                t.quiet()?;
                t.amo(completion_addr, AmoOp::Add(1), partner_pe)?;
            }
            Completion::Signal => {
                // `put_signal` only carries a single contiguous run, so
                // strided+signal falls back to a write then a separate
                // signal AMO — unlike plain `alltoall`'s Signal arm,
                // which gets put-then-signal atomicity for free from
                // `put_signal`, this needs its own `quiet` first so a
                // receiver can never observe the completion count before
                // every strided element has landed.
                write_strided(t, &payload, target, partner_pe)?;
                t.quiet()?;
                t.amo(completion_addr, AmoOp::Add(1), partner_pe)?;
            }
        }
    }

    if algorithm.completion != Completion::Barrier {
        let expected = (0..n).filter(|&r| r != rank).count() as u64;
        finish_deferred(team, t, algorithm.completion, expected)?;
    } else {
        super::round_barrier(team, t)?;
    }
    Ok(())
}
