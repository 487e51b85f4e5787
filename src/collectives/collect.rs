//! Collect (spec §4.3.4): variable per-PE contribution sizes; the
//! result on every PE is the concatenation of every PE's contribution,
//! in rank order.
//!
//! Unlike `fcollect`, the destination layout isn't known until every
//! PE's length has been exchanged — a prefix sum over per-PE byte
//! counts (spec §4.3.4). This reference implementation exchanges those
//! lengths through the team's `collective_psync` array, which caps
//! collect at `nranks <= PSYNC_WORDS` (spec's pSync budget is meant for
//! round counters, not an arbitrary-width metadata channel — a real
//! deployment would give collect its own small symmetric sizes buffer).

use super::algorithm::CollectAlgorithm;
use crate::error::{OshmemError, Result};
use crate::team::{PSYNC_WORDS, SYNC_VALUE, Team};
use crate::transport::{AmoOp, SymAddr, Transport};

fn validate(team: &Team, algorithm: CollectAlgorithm) -> Result<()> {
    super::check_team(team.nranks)?;
    if team.nranks as usize > PSYNC_WORDS {
        return Err(OshmemError::InvalidArgument(format!(
            "collect supports at most {PSYNC_WORDS} ranks, team has {}",
            team.nranks
        )));
    }
    if algorithm.requires_power_of_two() && !team.nranks.is_power_of_two() {
        return Err(OshmemError::InvalidArgument(format!(
            "{algorithm:?} requires a power-of-two team size, got {}",
            team.nranks
        )));
    }
    Ok(())
}

/// Exchanges every PE's contribution length through `collective_psync`
/// and returns `(offsets, total_len)`, where `offsets[r]` is where
/// rank `r`'s contribution begins in the concatenated result.
fn exchange_lengths(team: &Team, t: &dyn Transport, my_len: usize) -> Result<(Vec<usize>, usize)> {
    let rank = team.rank.expect("member");
    for r in 0..team.nranks {
        let pe = team.global_pe(r).expect("rank < nranks");
        t.amo(team.collective_psync.plus(rank as usize * 8), AmoOp::Set(my_len as u64), pe)?;
    }
    t.quiet()?;
    super::round_barrier(team, t)?;

    let mut lens = Vec::with_capacity(team.nranks as usize);
    for r in 0..team.nranks {
        let v = t.amo(team.collective_psync.plus(r as usize * 8), AmoOp::Add(0), t.my_pe())?;
        lens.push(v as usize);
    }
    let mut offsets = Vec::with_capacity(lens.len());
    let mut running = 0usize;
    for &len in &lens {
        offsets.push(running);
        running += len;
    }

    // Reset the words this exchange used back to SYNC_VALUE before
    // returning (spec §4.3.1 pSync hygiene).
    super::round_barrier(team, t)?;
    for r in 0..team.nranks {
        t.amo(team.collective_psync.plus(r as usize * 8), AmoOp::Set(SYNC_VALUE), t.my_pe())?;
    }
    Ok((offsets, running))
}

/// `dest` must have room for the exchanged total at every PE. Returns
/// the total byte length written.
pub fn collect(
    team: &Team,
    t: &dyn Transport,
    algorithm: CollectAlgorithm,
    dest: SymAddr,
    src: &[u8],
) -> Result<usize> {
    validate(team, algorithm)?;
    let rank = team.rank.expect("caller must be a team member");
    let (offsets, total) = exchange_lengths(team, t, src.len())?;
    // The concatenated size isn't known until the length exchange above
    // completes, so unlike every other family this overlap check can't
    // live in `validate` (spec §4.3.1).
    super::check_no_overlap(team, dest, total)?;
    let my_offset = offsets[rank as usize];

    t.put(dest.plus(my_offset), src, t.my_pe())?;
    if team.nranks == 1 {
        return Ok(total);
    }

    match algorithm {
        CollectAlgorithm::Linear | CollectAlgorithm::Simple => linear(team, t, dest, &offsets, src, rank)?,
        CollectAlgorithm::AllLinear => all_linear(team, t, dest, &offsets, src, rank)?,
        CollectAlgorithm::Ring => ring(team, t, dest, &offsets, total, rank)?,
        CollectAlgorithm::Bruck | CollectAlgorithm::BruckNoRotate => {
            bruck(team, t, dest, &offsets, total, rank)?
        }
        CollectAlgorithm::RecursiveDoubling | CollectAlgorithm::RecursiveDoublingSignal => {
            recursive_doubling(team, t, dest, &offsets, total, rank)?
        }
    }
    super::round_barrier(team, t)?;
    Ok(total)
}

fn read_own(t: &dyn Transport, addr: SymAddr, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    if len > 0 {
        t.get(&mut buf, addr, t.my_pe())?;
    }
    Ok(buf)
}

fn linear(team: &Team, t: &dyn Transport, dest: SymAddr, offsets: &[usize], src: &[u8], rank: u32) -> Result<()> {
    if rank == 0 {
        for r in 1..team.nranks {
            // Rank 0 doesn't know r's length directly here, but the
            // gap between consecutive offsets (or the tail to `dest`'s
            // known total) gives it — computed by the caller already.
            let pe = team.global_pe(r).expect("rank < nranks");
            let len = if (r as usize + 1) < offsets.len() {
                offsets[r as usize + 1] - offsets[r as usize]
            } else {
                0
            };
            let mut buf = vec![0u8; len];
            if len > 0 {
                t.get(&mut buf, dest.plus(offsets[r as usize]), pe)?;
            }
            t.put(dest.plus(offsets[r as usize]), &buf, t.my_pe())?;
        }
    }
    let _ = src;
    Ok(())
}

fn all_linear(team: &Team, t: &dyn Transport, dest: SymAddr, offsets: &[usize], src: &[u8], rank: u32) -> Result<()> {
    for r in 0..team.nranks {
        if r == rank {
            continue;
        }
        let pe = team.global_pe(r).expect("rank < nranks");
        t.put(dest.plus(offsets[rank as usize]), src, pe)?;
    }
    t.quiet()
}

fn ring(team: &Team, t: &dyn Transport, dest: SymAddr, offsets: &[usize], total: usize, rank: u32) -> Result<()> {
    let end_of = |r: usize| if r + 1 < offsets.len() { offsets[r + 1] } else { total };
    let mut owner = rank as usize;
    for _ in 0..team.nranks.saturating_sub(1) {
        let len = end_of(owner) - offsets[owner];
        if len > 0 {
            let payload = read_own(t, dest.plus(offsets[owner]), len)?;
            let next_pe = team.global_pe((rank + 1) % team.nranks).expect("rank < nranks");
            t.put(dest.plus(offsets[owner]), &payload, next_pe)?;
            t.quiet()?;
        }
        super::round_barrier(team, t)?;
        owner = (owner + team.nranks as usize - 1) % team.nranks as usize;
    }
    Ok(())
}

fn bruck(team: &Team, t: &dyn Transport, dest: SymAddr, offsets: &[usize], total: usize, rank: u32) -> Result<()> {
    let n = team.nranks;
    let rounds = crate::tree::dissemination_rounds(n);
    for r in 0..rounds {
        let d = 1u32 << r;
        let send_pe = team.global_pe((rank + n - d) % n).expect("rank < nranks");
        let payload = read_own(t, dest, total)?;
        t.put(dest, &payload, send_pe)?;
        t.quiet()?;
        super::round_barrier(team, t)?;
    }
    let _ = offsets;
    Ok(())
}

fn recursive_doubling(team: &Team, t: &dyn Transport, dest: SymAddr, offsets: &[usize], total: usize, rank: u32) -> Result<()> {
    let mut mask = 1u32;
    while mask < team.nranks {
        let partner = team.global_pe(rank ^ mask).expect("xor partner in range");
        let payload = read_own(t, dest, total)?;
        t.put(dest, &payload, partner)?;
        t.quiet()?;
        super::round_barrier(team, t)?;
        mask <<= 1;
    }
    let _ = offsets;
    Ok(())
}
