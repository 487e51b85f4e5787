//! Broadcast family (spec §4.3.3): after return, every PE's destination
//! equals the root's source.
//!
//! Tree algorithms forward data a node has already received by reading
//! it back from its own symmetric `dest` (a same-process "put to self"
//! is how `root` seeds its own copy, and a same-process "get from self"
//! is how an internal node re-reads what it just received to relay to
//! its children) — the same one-sided primitives every other PE uses,
//! just addressed at `my_pe()`.

use super::algorithm::BroadcastAlgorithm;
use crate::error::{OshmemError, Result};
use crate::team::{PSYNC_WORDS, SYNC_VALUE, Team};
use crate::transport::{Cmp, SignalOp, SymAddr, Transport};

fn validate(
    team: &Team,
    algorithm: BroadcastAlgorithm,
    dest: SymAddr,
    root: u32,
    dest_len: usize,
    src_len: usize,
    rank: u32,
) -> Result<()> {
    super::check_team(team.nranks)?;
    super::check_no_overlap(team, dest, dest_len)?;
    if root >= team.nranks {
        return Err(OshmemError::InvalidArgument(format!("root {root} out of range")));
    }
    if rank == root && src_len != dest_len {
        return Err(OshmemError::InvalidArgument(
            "root's source and destination must be the same length".into(),
        ));
    }
    let uses_arrival_signal = matches!(
        algorithm,
        BroadcastAlgorithm::CompleteTree | BroadcastAlgorithm::Binomial | BroadcastAlgorithm::KNomial
    );
    if uses_arrival_signal && team.nranks as usize > PSYNC_WORDS {
        return Err(OshmemError::InvalidArgument(format!(
            "{algorithm:?} broadcast supports at most {PSYNC_WORDS} ranks (one pSync word per rank), team has {}",
            team.nranks
        )));
    }
    Ok(())
}

fn read_own(t: &dyn Transport, addr: SymAddr, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    t.get(&mut buf, addr, t.my_pe())?;
    Ok(buf)
}

pub fn broadcast(
    team: &Team,
    t: &dyn Transport,
    algorithm: BroadcastAlgorithm,
    tree_radix: u32,
    dest: SymAddr,
    dest_len: usize,
    src: &[u8],
    root: u32,
) -> Result<()> {
    let rank = team.rank.expect("caller must be a team member");
    validate(team, algorithm, dest, root, dest_len, src.len(), rank)?;
    if team.nranks == 1 {
        if rank == root {
            t.put(dest, src, t.my_pe())?;
        }
        return Ok(());
    }

    if rank == root {
        t.put(dest, src, t.my_pe())?;
    }

    match algorithm {
        BroadcastAlgorithm::Linear => linear(team, t, dest, dest_len, src, root, rank)?,
        BroadcastAlgorithm::CompleteTree => tree(team, t, dest, dest_len, root, rank, |r| {
            (
                crate::tree::complete_tree_parent(r, root, team.nranks, tree_radix),
                crate::tree::complete_tree_children(r, root, team.nranks, tree_radix),
            )
        })?,
        BroadcastAlgorithm::Binomial => tree(team, t, dest, dest_len, root, rank, |r| {
            (
                crate::tree::knomial_parent(r, root, team.nranks, 2),
                crate::tree::knomial_children(r, root, team.nranks, 2),
            )
        })?,
        BroadcastAlgorithm::KNomial => tree(team, t, dest, dest_len, root, rank, |r| {
            (
                crate::tree::knomial_parent(r, root, team.nranks, tree_radix),
                crate::tree::knomial_children(r, root, team.nranks, tree_radix),
            )
        })?,
        BroadcastAlgorithm::ScatterCollect => scatter_collect(team, t, dest, dest_len, root, rank)?,
    }
    super::round_barrier(team, t)
}

fn linear(
    team: &Team,
    t: &dyn Transport,
    dest: SymAddr,
    dest_len: usize,
    src: &[u8],
    root: u32,
    rank: u32,
) -> Result<()> {
    if rank != root {
        return Ok(());
    }
    for r in 0..team.nranks {
        if r == root {
            continue;
        }
        let pe = team.global_pe(r).expect("rank < nranks");
        t.put(dest, src, pe)?;
    }
    t.quiet()?;
    let _ = dest_len;
    Ok(())
}

/// Generic parent/children tree walk shared by complete-tree, binomial,
/// and k-nomial broadcast: each rank owns one word of `collective_psync`
/// (word `r` belongs to rank `r`) that stays at `SYNC_VALUE` until that
/// rank's copy of `dest` is populated. A node relays to each child with
/// `put_signal`, so the child's copy of the parent's word only moves
/// once the data itself has landed — unlike polling the payload bytes
/// for "not all-zero", this can't be fooled by a legitimate all-zero
/// payload, and unlike a `put` followed by a separate `amo`, there's no
/// window where a child could observe the signal before the data.
fn tree(
    team: &Team,
    t: &dyn Transport,
    dest: SymAddr,
    dest_len: usize,
    root: u32,
    rank: u32,
    topology: impl Fn(u32) -> (Option<u32>, Vec<u32>),
) -> Result<()> {
    let (parent, children) = topology(rank);
    if rank != root {
        let parent_rank = parent.expect("every non-root has a parent in a spanning tree");
        let signal = team.collective_psync.plus(parent_rank as usize * 8);
        t.wait_until(signal, Cmp::Ne, SYNC_VALUE);
        // Only this rank ever reads its own copy of its parent's word, so
        // resetting it back to SYNC_VALUE right after observing it is safe
        // (spec §4.3.1 pSync hygiene) — no barrier needed first.
        t.amo(signal, crate::transport::AmoOp::Set(SYNC_VALUE), t.my_pe())?;
    }
    if !children.is_empty() {
        let payload = read_own(t, dest, dest_len)?;
        let my_signal = team.collective_psync.plus(rank as usize * 8);
        for c in children {
            let pe = team.global_pe(c).expect("child rank < nranks");
            t.put_signal(dest, &payload, my_signal, 1, SignalOp::Add, pe)?;
        }
        t.quiet()?;
    }
    Ok(())
}

/// Root splits its source into `nranks` disjoint blocks and scatters
/// them directly; every PE then runs a collect-style ring pass to
/// reassemble the full buffer (spec §4.3.3 "scatter-collect").
fn scatter_collect(
    team: &Team,
    t: &dyn Transport,
    dest: SymAddr,
    dest_len: usize,
    root: u32,
    rank: u32,
) -> Result<()> {
    let n = team.nranks as usize;
    let block = dest_len.div_ceil(n);

    if rank == root {
        let whole = read_own(t, dest, dest_len)?;
        for r in 0..team.nranks {
            let start = (r as usize) * block;
            if start >= dest_len {
                continue;
            }
            let end = (start + block).min(dest_len);
            let pe = team.global_pe(r).expect("rank < nranks");
            t.put(dest.plus(start), &whole[start..end], pe)?;
        }
        t.quiet()?;
    }
    super::round_barrier(team, t)?;

    // Ring collect: each PE forwards its own block around the ring
    // `nranks - 1` times so everyone ends up with every block. Every PE
    // runs the same number of rounds (even ones with no block of their
    // own to contribute) so `round_barrier` calls stay matched.
    let my_start = (rank as usize) * block;
    let my_end = (my_start + block).min(dest_len);
    let mut carry_start = my_start;
    let mut carry = if my_start < dest_len { read_own(t, dest.plus(my_start), my_end - my_start)? } else { Vec::new() };
    for _ in 0..team.nranks.saturating_sub(1) {
        if !carry.is_empty() {
            let next_rank = (rank + 1) % team.nranks;
            let next_pe = team.global_pe(next_rank).expect("rank < nranks");
            t.put(dest.plus(carry_start), &carry, next_pe)?;
            t.quiet()?;
        }
        super::round_barrier(team, t)?;
        let prev_rank = (rank + team.nranks - 1) % team.nranks;
        carry_start = (prev_rank as usize) * block;
        carry = if carry_start < dest_len {
            let end = (carry_start + block).min(dest_len);
            read_own(t, dest.plus(carry_start), end - carry_start)?
        } else {
            Vec::new()
        };
    }
    Ok(())
}

#[cfg(all(test, feature = "sim-transport"))]
mod tests {
    use super::*;
    use crate::pe::Pe;
    use crate::sim::SimTransport;
    use std::sync::Arc;

    fn run(n: u32, root: u32, algorithm: BroadcastAlgorithm) {
        let sim = Arc::new(SimTransport::new(n));
        let heap = sim.register_heap(4096);
        let dest = SymAddr::new(heap, 0);
        let payload: Vec<u8> = (100..100 + 10u8).collect();

        let handles: Vec<_> = (0..n)
            .map(|pe| {
                let sim = Arc::clone(&sim);
                let payload = payload.clone();
                std::thread::spawn(move || {
                    let t = sim.handle_for(Pe::new(pe));
                    let team = Team::world(n, Pe::new(pe), SymAddr::new(heap, 2048), SymAddr::new(heap, 3072));
                    let src = if pe == root { payload.clone() } else { Vec::new() };
                    broadcast(&team, &t, algorithm, 2, dest, payload.len(), &src, root).unwrap();
                    read_own(&t, dest, payload.len()).unwrap()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), payload);
        }
    }

    #[test]
    fn linear_broadcast_reaches_everyone() {
        run(6, 0, BroadcastAlgorithm::Linear);
        run(6, 3, BroadcastAlgorithm::Linear);
    }

    #[test]
    fn binomial_broadcast_reaches_everyone() {
        run(8, 3, BroadcastAlgorithm::Binomial);
    }

    #[test]
    fn complete_tree_broadcast_reaches_everyone() {
        run(9, 2, BroadcastAlgorithm::CompleteTree);
    }

    #[test]
    fn knomial_broadcast_reaches_everyone() {
        run(10, 1, BroadcastAlgorithm::KNomial);
    }

    #[test]
    fn scatter_collect_broadcast_reaches_everyone() {
        run(5, 2, BroadcastAlgorithm::ScatterCollect);
    }
}
