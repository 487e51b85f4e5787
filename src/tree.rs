//! Peer math (spec §4.1 "Tree/Peer Math"): given `(team_size, root, radix,
//! me)`, compute the parent/children relationship for the tree shapes the
//! collective algorithms walk, plus the handful of standalone peer
//! formulas (bit-reverse, dissemination offsets, edge-coloring) that
//! don't need a persistent tree structure at all.
//!
//! Every function below takes ranks *relative to the team* (`0..nranks`)
//! and a `root`; callers translate to/from global PEs through the
//! team's fwd/rev maps.

/// Reverses the low `nbits` bits of `x`. Used by Bruck-family algorithms
/// that walk peers in bit-reversed order.
pub fn bit_reverse(x: u32, nbits: u32) -> u32 {
    if nbits == 0 {
        return 0;
    }
    x.reverse_bits() >> (u32::BITS - nbits)
}

/// The peer a dissemination-barrier round `r` (0-based) signals: spec
/// §4.3.2, "each PE signals PE `(me + 2^r) mod nranks`".
pub fn dissemination_partner(rank: u32, nranks: u32, round: u32) -> u32 {
    debug_assert!(nranks > 0);
    (rank + (1u32 << round)) % nranks
}

/// Number of dissemination rounds needed to cover `nranks` participants:
/// `⌈log2 nranks⌉`, with the degenerate single-PE case needing none.
pub fn dissemination_rounds(nranks: u32) -> u32 {
    if nranks <= 1 {
        0
    } else {
        (u32::BITS - (nranks - 1).leading_zeros()).max(1)
    }
}

/// Parent of `rank` in a `radix`-nomial tree rooted at `root` over
/// `nranks` participants (spec §4.3.2/§4.3.3: `radix = 2` is the
/// binomial tree). `None` means `rank == root`.
pub fn knomial_parent(rank: u32, root: u32, nranks: u32, radix: u32) -> Option<u32> {
    debug_assert!(radix >= 2);
    let vrank = (rank + nranks - root) % nranks;
    if vrank == 0 {
        return None;
    }
    let mut mask = 1u32;
    while mask < nranks {
        let digit = (vrank / mask) % radix;
        if digit != 0 {
            let parent_vrank = vrank - digit * mask;
            return Some((parent_vrank + root) % nranks);
        }
        mask = mask.saturating_mul(radix);
    }
    // Every rank other than the root has a nonzero digit at some mask
    // below `nranks`, so this is unreachable — but never panic on
    // cluster-supplied ranks.
    None
}

/// Direct children of `rank` in the same tree `knomial_parent` describes.
pub fn knomial_children(rank: u32, root: u32, nranks: u32, radix: u32) -> Vec<u32> {
    debug_assert!(radix >= 2);
    let vrank = (rank + nranks - root) % nranks;

    // Find the mask level at which this node was attached to its parent
    // (mirrors the scan in `knomial_parent`); children continue the scan
    // one level deeper.
    let mut recv_mask = 0u32;
    let mut probe = 1u32;
    while probe < nranks {
        if (vrank / probe) % radix != 0 {
            recv_mask = probe;
            break;
        }
        probe = probe.saturating_mul(radix);
    }

    let mut mask = if recv_mask == 0 { 1 } else { recv_mask.saturating_mul(radix) };
    let mut children = Vec::new();
    while mask < nranks {
        for i in 1..radix {
            let child_vrank = vrank + i * mask;
            if child_vrank < nranks {
                children.push((child_vrank + root) % nranks);
            }
        }
        mask = mask.saturating_mul(radix);
    }
    children
}

/// Parent of `rank` in a flat, `degree`-ary complete tree rooted at
/// `root` (spec §4.3.2 "complete-tree": children signal parent up,
/// parent signals children down; every internal node has up to `degree`
/// children, assigned by increasing rank — spec's tie-break rule).
pub fn complete_tree_parent(rank: u32, root: u32, nranks: u32, degree: u32) -> Option<u32> {
    debug_assert!(degree >= 1);
    let vrank = (rank + nranks - root) % nranks;
    if vrank == 0 {
        return None;
    }
    let parent_vrank = (vrank - 1) / degree;
    Some((parent_vrank + root) % nranks)
}

pub fn complete_tree_children(rank: u32, root: u32, nranks: u32, degree: u32) -> Vec<u32> {
    debug_assert!(degree >= 1);
    let vrank = (rank + nranks - root) % nranks;
    (1..=degree)
        .map(|i| vrank * degree + i)
        .take_while(|&c| c < nranks)
        .map(|c| (c + root) % nranks)
        .collect()
}

/// Peer for all-to-all's color-pairwise-exchange round `round`, spec
/// §4.3.5's edge-coloring formula. Returns `None` when `rank` rests this
/// round (only possible for odd `nranks`).
pub fn edge_color_partner(rank: u32, nranks: u32, round: u32) -> Option<u32> {
    let chr = if nranks % 2 == 0 { nranks - 1 } else { nranks };
    let i = round;
    let v = if rank < chr {
        (i + chr - rank) % chr
    } else if i % 2 == 1 {
        ((i + chr) / 2) % chr
    } else {
        i / 2
    };

    if nranks % 2 != 0 && v == rank {
        None
    } else if v == rank {
        Some(chr)
    } else {
        Some(v)
    }
}

/// Number of rounds the color-pairwise-exchange schedule needs to cover
/// every pair: the chromatic index from `edge_color_partner`.
pub fn edge_color_rounds(nranks: u32) -> u32 {
    if nranks % 2 == 0 { nranks - 1 } else { nranks }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_reverse_round_trips_identity_at_zero_bits() {
        assert_eq!(bit_reverse(0b101, 0), 0);
        assert_eq!(bit_reverse(0b001, 3), 0b100);
        assert_eq!(bit_reverse(0b110, 3), 0b011);
    }

    #[test]
    fn dissemination_rounds_matches_ceil_log2() {
        assert_eq!(dissemination_rounds(1), 0);
        assert_eq!(dissemination_rounds(2), 1);
        assert_eq!(dissemination_rounds(3), 2);
        assert_eq!(dissemination_rounds(4), 2);
        assert_eq!(dissemination_rounds(5), 3);
        assert_eq!(dissemination_rounds(8), 3);
    }

    #[test]
    fn knomial_radix_two_forms_a_spanning_tree_reaching_every_rank() {
        let n = 13;
        let root = 5;
        let mut reached = vec![false; n as usize];
        reached[root as usize] = true;
        let mut frontier = vec![root];
        while let Some(r) = frontier.pop() {
            for c in knomial_children(r, root, n, 2) {
                assert!(!reached[c as usize], "each rank reached exactly once");
                reached[c as usize] = true;
                frontier.push(c);
            }
        }
        assert!(reached.iter().all(|&r| r), "every rank reachable from root");
    }

    #[test]
    fn knomial_parent_child_are_mutually_consistent() {
        let n = 17;
        let root = 3;
        for radix in [2u32, 3, 4] {
            for rank in 0..n {
                if let Some(p) = knomial_parent(rank, root, n, radix) {
                    let siblings = knomial_children(p, root, n, radix);
                    assert!(
                        siblings.contains(&rank),
                        "radix={radix} rank={rank} parent={p} children={siblings:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn complete_tree_is_a_spanning_tree() {
        let n = 10;
        let root = 2;
        let degree = 3;
        let mut reached = vec![false; n as usize];
        reached[root as usize] = true;
        let mut frontier = vec![root];
        while let Some(r) = frontier.pop() {
            for c in complete_tree_children(r, root, n, degree) {
                assert!(!reached[c as usize]);
                reached[c as usize] = true;
                frontier.push(c);
            }
        }
        assert!(reached.iter().all(|&r| r));
    }

    #[test]
    fn edge_color_pairs_are_symmetric_each_round() {
        for n in [4u32, 6, 8, 10] {
            for round in 0..edge_color_rounds(n) {
                for rank in 0..n {
                    if let Some(partner) = edge_color_partner(rank, n, round) {
                        assert_eq!(
                            edge_color_partner(partner, n, round),
                            Some(rank),
                            "n={n} round={round} rank={rank}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn edge_color_odd_n_rests_exactly_one_rank_per_round() {
        let n = 5;
        for round in 0..edge_color_rounds(n) {
            let resting = (0..n).filter(|&r| edge_color_partner(r, n, round).is_none()).count();
            assert_eq!(resting, 1, "round {round}");
        }
    }
}
