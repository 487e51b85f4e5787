//! Reductions (spec §4.3.6). Every PE contributes a vector of `nreduce`
//! typed elements; on return every PE's `dest` holds the combined
//! result (the "to_all" form — the only one this engine exposes, team
//! membership itself standing in for the legacy active-set argument).
//!
//! Combine steps never race: every step is "pull the peer's current
//! value via `get`, combine locally, write only my own copy via `put`
//! to self" — the same safe pull-then-self-write shape used throughout
//! `broadcast.rs`/`fcollect.rs`, never a push into a peer's memory that
//! peer might be combining concurrently.

use super::algorithm::{ReduceAlgorithm, ReduceOp};
use crate::error::{OshmemError, Result};
use crate::team::Team;
use crate::transport::{SymAddr, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceKind {
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
}

impl ReduceKind {
    pub fn elem_size(self) -> usize {
        match self {
            ReduceKind::I32 | ReduceKind::U32 | ReduceKind::F32 => 4,
            ReduceKind::I64 | ReduceKind::U64 | ReduceKind::F64 => 8,
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, ReduceKind::I32 | ReduceKind::I64 | ReduceKind::U32 | ReduceKind::U64)
    }
}

fn combine_elem(op: ReduceOp, kind: ReduceKind, a: &[u8], b: &[u8]) -> Vec<u8> {
    macro_rules! int_op {
        ($ty:ty, $from:ident, $to:ident) => {{
            let x = <$ty>::$from(a.try_into().unwrap());
            let y = <$ty>::$from(b.try_into().unwrap());
            let r: $ty = match op {
                ReduceOp::And => x & y,
                ReduceOp::Or => x | y,
                ReduceOp::Xor => x ^ y,
                ReduceOp::Sum => x.wrapping_add(y),
                ReduceOp::Prod => x.wrapping_mul(y),
                ReduceOp::Min => x.min(y),
                ReduceOp::Max => x.max(y),
            };
            r.$to().to_vec()
        }};
    }
    macro_rules! float_op {
        ($ty:ty, $from:ident, $to:ident) => {{
            let x = <$ty>::$from(a.try_into().unwrap());
            let y = <$ty>::$from(b.try_into().unwrap());
            let r: $ty = match op {
                ReduceOp::Sum => x + y,
                ReduceOp::Prod => x * y,
                ReduceOp::Min => x.min(y),
                ReduceOp::Max => x.max(y),
                ReduceOp::And | ReduceOp::Or | ReduceOp::Xor => unreachable!("integer-only op"),
            };
            r.$to().to_vec()
        }};
    }
    match kind {
        ReduceKind::I32 => int_op!(i32, from_le_bytes, to_le_bytes),
        ReduceKind::I64 => int_op!(i64, from_le_bytes, to_le_bytes),
        ReduceKind::U32 => int_op!(u32, from_le_bytes, to_le_bytes),
        ReduceKind::U64 => int_op!(u64, from_le_bytes, to_le_bytes),
        ReduceKind::F32 => float_op!(f32, from_le_bytes, to_le_bytes),
        ReduceKind::F64 => float_op!(f64, from_le_bytes, to_le_bytes),
    }
}

fn combine_vec(op: ReduceOp, kind: ReduceKind, a: &[u8], b: &[u8]) -> Vec<u8> {
    let es = kind.elem_size();
    debug_assert_eq!(a.len(), b.len());
    let mut out = Vec::with_capacity(a.len());
    for i in 0..a.len() / es {
        out.extend(combine_elem(op, kind, &a[i * es..(i + 1) * es], &b[i * es..(i + 1) * es]));
    }
    out
}

fn validate(team: &Team, op: ReduceOp, kind: ReduceKind, dest: SymAddr, src_len: usize, nreduce: usize) -> Result<()> {
    super::check_team(team.nranks)?;
    super::check_no_overlap(team, dest, nreduce * kind.elem_size())?;
    if op.integer_only() && !kind.is_integer() {
        return Err(OshmemError::InvalidArgument(format!("{op:?} is only defined for integer types")));
    }
    if src_len != nreduce * kind.elem_size() {
        return Err(OshmemError::InvalidArgument("src length must equal nreduce * element size".into()));
    }
    Ok(())
}

fn read_own(t: &dyn Transport, addr: SymAddr, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    if len > 0 {
        t.get(&mut buf, addr, t.my_pe())?;
    }
    Ok(buf)
}

fn read_from(t: &dyn Transport, pe: crate::pe::Pe, addr: SymAddr, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    if len > 0 {
        t.get(&mut buf, addr, pe)?;
    }
    Ok(buf)
}

fn write_own(t: &dyn Transport, addr: SymAddr, data: &[u8]) -> Result<()> {
    if !data.is_empty() {
        t.put(addr, data, t.my_pe())?;
    }
    Ok(())
}

pub fn reduce(
    team: &Team,
    t: &dyn Transport,
    algorithm: ReduceAlgorithm,
    op: ReduceOp,
    kind: ReduceKind,
    dest: SymAddr,
    src: &[u8],
    nreduce: usize,
) -> Result<()> {
    validate(team, op, kind, dest, src.len(), nreduce)?;
    let es = kind.elem_size();
    let rank = team.rank.expect("caller must be a team member");
    write_own(t, dest, src)?;
    if team.nranks == 1 {
        return Ok(());
    }
    super::round_barrier(team, t)?;

    match algorithm {
        ReduceAlgorithm::Linear => linear(team, t, op, kind, dest, nreduce, rank)?,
        ReduceAlgorithm::Binomial => binomial(team, t, op, kind, dest, nreduce)?,
        ReduceAlgorithm::RecursiveDoubling => {
            let p = largest_pow2_le(team.nranks);
            fold_extra(team, t, op, kind, dest, es * nreduce, p)?;
            recursive_doubling_core(team, t, op, kind, dest, nreduce, p)?;
            unfold_extra(team, t, dest, es * nreduce, p)?;
        }
        ReduceAlgorithm::Rabenseifner => {
            let p = largest_pow2_le(team.nranks);
            fold_extra(team, t, op, kind, dest, es * nreduce, p)?;
            reduce_scatter_halving(team, t, op, kind, dest, nreduce, p)?;
            allgather_doubling(team, t, dest, nreduce, es, p)?;
            unfold_extra(team, t, dest, es * nreduce, p)?;
        }
        ReduceAlgorithm::Rabenseifner2 => {
            let p = largest_pow2_le(team.nranks);
            fold_extra(team, t, op, kind, dest, es * nreduce, p)?;
            reduce_scatter_halving(team, t, op, kind, dest, nreduce, p)?;
            allgather_ring(team, t, dest, nreduce, es, p)?;
            unfold_extra(team, t, dest, es * nreduce, p)?;
        }
    }
    super::round_barrier(team, t)
}

fn linear(team: &Team, t: &dyn Transport, op: ReduceOp, kind: ReduceKind, dest: SymAddr, nreduce: usize, rank: u32) -> Result<()> {
    const ROOT: u32 = 0;
    let es = kind.elem_size();
    if rank == ROOT {
        let mut acc = read_own(t, dest, nreduce * es)?;
        for r in 1..team.nranks {
            let pe = team.global_pe(r).expect("rank < nranks");
            let theirs = read_from(t, pe, dest, nreduce * es)?;
            acc = combine_vec(op, kind, &acc, &theirs);
        }
        write_own(t, dest, &acc)?;
        super::round_barrier(team, t)?;
        for r in 0..team.nranks {
            if r == ROOT {
                continue;
            }
            let pe = team.global_pe(r).expect("rank < nranks");
            t.put(dest, &acc, pe)?;
        }
        t.quiet()
    } else {
        super::round_barrier(team, t)
    }
}

fn tree_depth(mut r: u32, root: u32, nranks: u32, radix: u32) -> u32 {
    let mut d = 0;
    while r != root {
        r = crate::tree::knomial_parent(r, root, nranks, radix).expect("connected spanning tree");
        d += 1;
    }
    d
}

/// Binomial tree reduce-up followed by a tree broadcast-down (spec
/// §4.3.6). Works for any `nranks`, no folding needed.
fn binomial(team: &Team, t: &dyn Transport, op: ReduceOp, kind: ReduceKind, dest: SymAddr, nreduce: usize) -> Result<()> {
    const ROOT: u32 = 0;
    const RADIX: u32 = 2;
    let n = team.nranks;
    let rank = team.rank.expect("member");
    let es = kind.elem_size();
    let max_depth = (0..n).map(|r| tree_depth(r, ROOT, n, RADIX)).max().unwrap_or(0);

    // Reduce-up: process levels from the deepest parents to the root so
    // a node only combines children that have already finished their
    // own subtree.
    for level in (0..max_depth).rev() {
        if tree_depth(rank, ROOT, n, RADIX) == level {
            let children = crate::tree::knomial_children(rank, ROOT, n, RADIX);
            if !children.is_empty() {
                let mut acc = read_own(t, dest, nreduce * es)?;
                for c in children {
                    let pe = team.global_pe(c).expect("child rank < nranks");
                    let theirs = read_from(t, pe, dest, nreduce * es)?;
                    acc = combine_vec(op, kind, &acc, &theirs);
                }
                write_own(t, dest, &acc)?;
            }
        }
        super::round_barrier(team, t)?;
    }

    // Broadcast-down: root already holds the final value; push level by
    // level so a node only relays after receiving its own copy.
    for level in 0..max_depth {
        if tree_depth(rank, ROOT, n, RADIX) == level {
            let children = crate::tree::knomial_children(rank, ROOT, n, RADIX);
            if !children.is_empty() {
                let value = read_own(t, dest, nreduce * es)?;
                for c in children {
                    let pe = team.global_pe(c).expect("child rank < nranks");
                    t.put(dest, &value, pe)?;
                }
                t.quiet()?;
            }
        }
        super::round_barrier(team, t)?;
    }
    Ok(())
}

fn largest_pow2_le(n: u32) -> u32 {
    if n == 0 { 0 } else { 1u32 << (31 - n.leading_zeros()) }
}

/// Folds ranks `[p, nranks)` into their paired core rank `rank - p`
/// before a power-of-two-only core algorithm runs (spec §4.3.6: "fold
/// the extra PEs into the power-of-two core at the start").
fn fold_extra(team: &Team, t: &dyn Transport, op: ReduceOp, kind: ReduceKind, dest: SymAddr, total_bytes: usize, p: u32) -> Result<()> {
    let rank = team.rank.expect("member");
    let n = team.nranks;
    super::round_barrier(team, t)?;
    if rank < p {
        let extra_rank = rank + p;
        if extra_rank < n {
            let extra_pe = team.global_pe(extra_rank).expect("extra rank < nranks");
            let mine = read_own(t, dest, total_bytes)?;
            let theirs = read_from(t, extra_pe, dest, total_bytes)?;
            let combined = combine_vec(op, kind, &mine, &theirs);
            write_own(t, dest, &combined)?;
        }
    }
    super::round_barrier(team, t)
}

/// Reverses [`fold_extra`]: every paired extra PE receives the core's
/// final result after the core algorithm completes.
fn unfold_extra(team: &Team, t: &dyn Transport, dest: SymAddr, total_bytes: usize, p: u32) -> Result<()> {
    let rank = team.rank.expect("member");
    let n = team.nranks;
    if rank < p {
        let extra_rank = rank + p;
        if extra_rank < n {
            let extra_pe = team.global_pe(extra_rank).expect("extra rank < nranks");
            let value = read_own(t, dest, total_bytes)?;
            t.put(dest, &value, extra_pe)?;
            t.quiet()?;
        }
    }
    super::round_barrier(team, t)
}

fn recursive_doubling_core(team: &Team, t: &dyn Transport, op: ReduceOp, kind: ReduceKind, dest: SymAddr, nreduce: usize, p: u32) -> Result<()> {
    let rank = team.rank.expect("member");
    if rank >= p || p <= 1 {
        return Ok(());
    }
    let es = kind.elem_size();
    let mut mask = 1u32;
    while mask < p {
        let partner_rank = rank ^ mask;
        let partner_pe = team.global_pe(partner_rank).expect("xor partner in range");
        super::round_barrier(team, t)?;
        let mine = read_own(t, dest, nreduce * es)?;
        let theirs = read_from(t, partner_pe, dest, nreduce * es)?;
        let combined = combine_vec(op, kind, &mine, &theirs);
        write_own(t, dest, &combined)?;
        mask <<= 1;
    }
    Ok(())
}

/// The range assigned to `rank` after `level` rounds of top-down binary
/// splitting of `[0, nreduce)` into `2^level` groups — the same
/// recursion both `reduce_scatter_halving` and the two allgather
/// variants below key off of, so their boundaries always agree.
fn level_range(nreduce: usize, p: u32, rank: u32, level: u32) -> (usize, usize) {
    let log_p = p.trailing_zeros();
    let group_idx = if level == 0 { 0 } else { rank >> (log_p - level) };
    let mut ranges = vec![(0usize, nreduce)];
    for _ in 0..level {
        let mut next = Vec::with_capacity(ranges.len() * 2);
        for (off, count) in ranges {
            let lower = count - count / 2;
            next.push((off, lower));
            next.push((off + lower, count - lower));
        }
        ranges = next;
    }
    ranges[group_idx as usize]
}

fn reduce_scatter_halving(team: &Team, t: &dyn Transport, op: ReduceOp, kind: ReduceKind, dest: SymAddr, nreduce: usize, p: u32) -> Result<()> {
    let rank = team.rank.expect("member");
    if rank >= p || p <= 1 {
        return Ok(());
    }
    let es = kind.elem_size();
    let log_p = p.trailing_zeros();
    for r in 0..log_p {
        let bit = 1u32 << (log_p - 1 - r);
        let partner_rank = rank ^ bit;
        let partner_pe = team.global_pe(partner_rank).expect("halving partner in range");
        let (keep_off, keep_count) = level_range(nreduce, p, rank, r + 1);
        super::round_barrier(team, t)?;
        if keep_count > 0 {
            let mine = read_own(t, dest.plus(keep_off * es), keep_count * es)?;
            let theirs = read_from(t, partner_pe, dest.plus(keep_off * es), keep_count * es)?;
            let combined = combine_vec(op, kind, &mine, &theirs);
            write_own(t, dest.plus(keep_off * es), &combined)?;
        }
    }
    Ok(())
}

fn allgather_doubling(team: &Team, t: &dyn Transport, dest: SymAddr, nreduce: usize, es: usize, p: u32) -> Result<()> {
    let rank = team.rank.expect("member");
    if rank >= p || p <= 1 {
        return Ok(());
    }
    let log_p = p.trailing_zeros();
    for s in 0..log_p {
        let bit = 1u32 << s;
        let partner_rank = rank ^ bit;
        let partner_pe = team.global_pe(partner_rank).expect("doubling partner in range");
        let (p_off, p_count) = level_range(nreduce, p, partner_rank, log_p - s);
        super::round_barrier(team, t)?;
        if p_count > 0 {
            let theirs = read_from(t, partner_pe, dest.plus(p_off * es), p_count * es)?;
            write_own(t, dest.plus(p_off * es), &theirs)?;
        }
        super::round_barrier(team, t)?;
    }
    Ok(())
}

fn allgather_ring(team: &Team, t: &dyn Transport, dest: SymAddr, nreduce: usize, es: usize, p: u32) -> Result<()> {
    let rank = team.rank.expect("member");
    if rank >= p || p <= 1 {
        return Ok(());
    }
    let log_p = p.trailing_zeros();
    let mut owner = rank;
    for _ in 0..p.saturating_sub(1) {
        let (off, count) = level_range(nreduce, p, owner, log_p);
        super::round_barrier(team, t)?;
        if count > 0 {
            let payload = read_own(t, dest.plus(off * es), count * es)?;
            let next_pe = team.global_pe((rank + 1) % p).expect("rank < p");
            t.put(dest.plus(off * es), &payload, next_pe)?;
            t.quiet()?;
        }
        owner = (owner + p - 1) % p;
    }
    super::round_barrier(team, t)
}
