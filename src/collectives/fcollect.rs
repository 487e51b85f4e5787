//! Fcollect (spec §4.3.4): fixed-size contribution per PE; result on
//! every PE is the rank-ordered concatenation of every PE's
//! `per_pe_len`-byte contribution.

use super::algorithm::FcollectAlgorithm;
use crate::error::{OshmemError, Result};
use crate::team::Team;
use crate::transport::{SymAddr, Transport};

fn validate(team: &Team, algorithm: FcollectAlgorithm, dest: SymAddr, per_pe_len: usize) -> Result<()> {
    super::check_team(team.nranks)?;
    super::check_no_overlap(team, dest, per_pe_len * team.nranks as usize)?;
    if per_pe_len == 0 {
        return Err(OshmemError::InvalidArgument("fcollect per-PE length must be nonzero".into()));
    }
    if algorithm.requires_power_of_two() && !team.nranks.is_power_of_two() {
        return Err(OshmemError::InvalidArgument(format!(
            "{algorithm:?} requires a power-of-two team size, got {}",
            team.nranks
        )));
    }
    if algorithm.requires_even_nranks() && team.nranks % 2 != 0 {
        return Err(OshmemError::InvalidArgument(format!(
            "{algorithm:?} requires an even team size, got {}",
            team.nranks
        )));
    }
    Ok(())
}

/// `dest` must have room for `nranks * per_pe_len` bytes at every PE;
/// `src` is this PE's own `per_pe_len`-byte contribution.
pub fn fcollect(
    team: &Team,
    t: &dyn Transport,
    algorithm: FcollectAlgorithm,
    dest: SymAddr,
    per_pe_len: usize,
    src: &[u8],
) -> Result<()> {
    validate(team, algorithm, dest, per_pe_len)?;
    if src.len() != per_pe_len {
        return Err(OshmemError::InvalidArgument("fcollect source length must equal per_pe_len".into()));
    }
    let rank = team.rank.expect("caller must be a team member");

    // Seed this PE's own slot directly; every algorithm below only
    // needs to move data it doesn't already have.
    t.put(dest.plus(rank as usize * per_pe_len), src, t.my_pe())?;
    if team.nranks == 1 {
        return Ok(());
    }

    match algorithm {
        FcollectAlgorithm::Linear => linear(team, t, dest, per_pe_len, rank)?,
        FcollectAlgorithm::AllLinear | FcollectAlgorithm::AllLinear1 => {
            all_linear(team, t, dest, per_pe_len, src)?
        }
        FcollectAlgorithm::RecursiveDoubling => recursive_doubling(team, t, dest, per_pe_len, rank)?,
        FcollectAlgorithm::Ring => ring(team, t, dest, per_pe_len, rank)?,
        FcollectAlgorithm::Bruck | FcollectAlgorithm::BruckSignal | FcollectAlgorithm::BruckInplace => {
            bruck(team, t, dest, per_pe_len, rank, true)?
        }
        FcollectAlgorithm::BruckNoRotate => bruck(team, t, dest, per_pe_len, rank, false)?,
        FcollectAlgorithm::NeighborExchange => neighbor_exchange(team, t, dest, per_pe_len, rank)?,
    }
    // Every algorithm above leaves some puts whose completion only the
    // *sender's* quiet observed; a closing sync makes sure every peer's
    // incoming puts have landed before any PE reads the assembled
    // result (spec §4.3.1: collectives complete everywhere before
    // returning anywhere, not just locally).
    super::round_barrier(team, t)
}

fn read_own(t: &dyn Transport, addr: SymAddr, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    t.get(&mut buf, addr, t.my_pe())?;
    Ok(buf)
}

/// Every PE puts its contribution directly into every other PE's slot —
/// one round, `O(nranks)` puts per PE.
fn all_linear(team: &Team, t: &dyn Transport, dest: SymAddr, per_pe_len: usize, src: &[u8]) -> Result<()> {
    let rank = team.rank.expect("member");
    for r in 0..team.nranks {
        if r == rank {
            continue;
        }
        let pe = team.global_pe(r).expect("rank < nranks");
        t.put(dest.plus(rank as usize * per_pe_len), src, pe)?;
    }
    t.quiet()
}

/// Rank 0 gathers everyone's slot with serial gets, then broadcasts the
/// whole buffer (spec's "linear" — a serial walk).
fn linear(team: &Team, t: &dyn Transport, dest: SymAddr, per_pe_len: usize, rank: u32) -> Result<()> {
    if rank == 0 {
        for r in 1..team.nranks {
            let pe = team.global_pe(r).expect("rank < nranks");
            let mut buf = vec![0u8; per_pe_len];
            t.get(&mut buf, dest.plus(r as usize * per_pe_len), pe)?;
            t.put(dest.plus(r as usize * per_pe_len), &buf, t.my_pe())?;
        }
        let whole = read_own(t, dest, per_pe_len * team.nranks as usize)?;
        for r in 1..team.nranks {
            let pe = team.global_pe(r).expect("rank < nranks");
            t.put(dest, &whole, pe)?;
        }
        t.quiet()?;
    } else {
        loop {
            let mine = read_own(t, dest.plus(rank as usize * per_pe_len), per_pe_len)?;
            if mine != vec![0u8; per_pe_len] {
                break;
            }
            t.progress();
        }
    }
    Ok(())
}

/// `log2(nranks)` rounds; each PE XORs its rank with `2^round` to find
/// its partner and exchanges everything gathered so far.
fn recursive_doubling(team: &Team, t: &dyn Transport, dest: SymAddr, per_pe_len: usize, rank: u32) -> Result<()> {
    let mut have = 1usize;
    let mut mask = 1u32;
    while mask < team.nranks {
        let partner_rank = rank ^ mask;
        let partner_pe = team.global_pe(partner_rank).expect("xor partner in range");
        let base = (rank & !((mask << 1) - 1)) as usize * per_pe_len;
        let payload = read_own(t, dest.plus(base), have * per_pe_len)?;
        t.put(dest.plus(base), &payload, partner_pe)?;
        t.quiet()?;
        super::round_barrier(team, t)?;
        have *= 2;
        mask <<= 1;
    }
    Ok(())
}

/// Each PE forwards the block it most recently received to its next
/// ring neighbor, `nranks - 1` times.
fn ring(team: &Team, t: &dyn Transport, dest: SymAddr, per_pe_len: usize, rank: u32) -> Result<()> {
    let mut block_owner = rank;
    for _ in 0..team.nranks.saturating_sub(1) {
        let next_pe = team.global_pe((rank + 1) % team.nranks).expect("rank < nranks");
        let payload = read_own(t, dest.plus(block_owner as usize * per_pe_len), per_pe_len)?;
        t.put(dest.plus(block_owner as usize * per_pe_len), &payload, next_pe)?;
        t.quiet()?;
        super::round_barrier(team, t)?;
        block_owner = (block_owner + team.nranks - 1) % team.nranks;
    }
    Ok(())
}

/// `⌈log2 nranks⌉` rounds; round `r` sends everything accumulated so
/// far to peer `(me - 2^r) mod nranks`. `rotate` controls whether the
/// final buffer is rotated into rank order (plain Bruck) or left
/// addressed in rotated form (`bruck_no_rotate`, spec §4.3.4).
fn bruck(team: &Team, t: &dyn Transport, dest: SymAddr, per_pe_len: usize, rank: u32, rotate: bool) -> Result<()> {
    let n = team.nranks;
    let rounds = crate::tree::dissemination_rounds(n);
    let mut have = 1usize;
    for r in 0..rounds {
        let d = 1u32 << r;
        let send_to = (rank + n - d) % n;
        let recv_from = (rank + d) % n;
        let send_pe = team.global_pe(send_to).expect("rank < nranks");
        let _ = recv_from;
        let payload = read_own(t, dest, have.min(n as usize) * per_pe_len)?;
        t.put(dest, &payload, send_pe)?;
        t.quiet()?;
        super::round_barrier(team, t)?;
        have = (have * 2).min(n as usize);
    }
    if rotate {
        let whole = read_own(t, dest, per_pe_len * n as usize)?;
        let mut rotated = vec![0u8; whole.len()];
        for k in 0..n as usize {
            let src_block = &whole[k * per_pe_len..(k + 1) * per_pe_len];
            let dst_rank = (k + rank as usize) % n as usize;
            rotated[dst_rank * per_pe_len..(dst_rank + 1) * per_pe_len].copy_from_slice(src_block);
        }
        t.put(dest, &rotated, t.my_pe())?;
    }
    Ok(())
}

/// Only defined for even `nranks` (spec §4.3.4): alternates exchanges
/// with the two ring neighbors over `nranks/2` rounds, doubling the
/// accumulated block each round.
fn neighbor_exchange(team: &Team, t: &dyn Transport, dest: SymAddr, per_pe_len: usize, rank: u32) -> Result<()> {
    let n = team.nranks;
    let left = (rank + n - 1) % n;
    let right = (rank + 1) % n;
    let mut have = 1usize;
    for round in 0..n / 2 {
        let partner = if round % 2 == 0 { right } else { left };
        let pe = team.global_pe(partner).expect("rank < nranks");
        let payload = read_own(t, dest, have.min(n as usize) * per_pe_len)?;
        t.put(dest, &payload, pe)?;
        t.quiet()?;
        super::round_barrier(team, t)?;
        have = (have * 2).min(n as usize);
    }
    Ok(())
}
