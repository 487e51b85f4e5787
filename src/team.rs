//! Teams (spec §3): immutable, named-or-anonymous subsets of PEs with
//! their own rank numbering and a pair of symmetric pSync work arrays.
//!
//! Team *creation* — deriving node-local peer sets for `SHARED`, or
//! splitting a parent team by strided/general selection — is the
//! bootstrap collaborator's job per spec §1; this module only models
//! the resulting immutable value and the bookkeeping every collective
//! needs from it (fwd/rev maps, pSync buffers).

use crate::pe::Pe;
use crate::transport::{AmoOp, SymAddr, Transport};

/// Sentinel every pSync element is initialized to and reset to after
/// use (spec §3, §4.3.1).
pub const SYNC_VALUE: u64 = u64::MAX;

/// Words reserved per pSync buffer — generous enough for the largest
/// round-counter array any algorithm here needs (at most one `u64` per
/// bit of `nranks`).
pub const PSYNC_WORDS: usize = 32;

/// Writes [`SYNC_VALUE`] into every word of a freshly-allocated pSync
/// buffer, on this PE's own copy only — every PE performs the identical
/// call, which is what keeping a symmetric buffer initialized requires
/// (spec §3: "pre-initialized to the sentinel `SYNC_VALUE`").
pub fn init_psync(t: &dyn Transport, addr: SymAddr) -> crate::error::Result<()> {
    let me = t.my_pe();
    for word in 0..PSYNC_WORDS {
        t.amo(addr.plus(word * 8), AmoOp::Set(SYNC_VALUE), me)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TeamId(pub u32);

pub const WORLD: TeamId = TeamId(0);
pub const SHARED: TeamId = TeamId(1);

/// An immutable team (spec §3). Two symmetric pSync arrays
/// (`barrier_psync`, `collective_psync`) back every collective this
/// team runs; the caller (the `Engine`) is responsible for allocating
/// them from a symmetric heap and for zero/`SYNC_VALUE`-initializing
/// them before first use.
pub struct Team {
    pub id: TeamId,
    pub name: Option<&'static str>,
    pub parent: Option<TeamId>,
    pub start: u32,
    pub stride: u32,
    pub nranks: u32,
    /// `None` if the calling PE is not a member.
    pub rank: Option<u32>,
    fwd: Vec<Pe>,
    rev: std::collections::HashMap<u32, u32>,
    pub barrier_psync: SymAddr,
    pub collective_psync: SymAddr,
}

impl Team {
    /// Builds a team from an explicit, caller-supplied member list in
    /// team-rank order — the shape every constructor below reduces to.
    /// `members[r]` is the global PE at team rank `r`.
    fn from_members(
        id: TeamId,
        name: Option<&'static str>,
        parent: Option<TeamId>,
        start: u32,
        stride: u32,
        members: Vec<Pe>,
        my_pe: Pe,
        barrier_psync: SymAddr,
        collective_psync: SymAddr,
    ) -> Self {
        let nranks = members.len() as u32;
        let rev = members.iter().enumerate().map(|(r, pe)| (pe.as_u32(), r as u32)).collect();
        let rank = members.iter().position(|&pe| pe == my_pe).map(|r| r as u32);
        Team {
            id,
            name,
            parent,
            start,
            stride,
            nranks,
            rank,
            fwd: members,
            rev,
            barrier_psync,
            collective_psync,
        }
    }

    /// The predefined `WORLD` team: every PE, `start=0`, `stride=1`.
    pub fn world(n_pes: u32, my_pe: Pe, barrier_psync: SymAddr, collective_psync: SymAddr) -> Self {
        let members = (0..n_pes).map(Pe::new).collect();
        Team::from_members(WORLD, Some("WORLD"), None, 0, 1, members, my_pe, barrier_psync, collective_psync)
    }

    /// The predefined `SHARED` team: every PE co-located with the
    /// caller on the same node, in peer order (spec §3). Node-local
    /// membership is determined by the bootstrap layer and handed in
    /// here as `node_peers`.
    pub fn shared(
        node_peers: Vec<Pe>,
        my_pe: Pe,
        barrier_psync: SymAddr,
        collective_psync: SymAddr,
    ) -> Self {
        Team::from_members(SHARED, Some("SHARED"), None, 0, 0, node_peers, my_pe, barrier_psync, collective_psync)
    }

    /// Derives a new team of `nranks` members `{start + i*stride : 0 <=
    /// i < nranks}` of `parent`'s rank space (spec §3). `None` if the
    /// requested range doesn't fit in the parent team.
    pub fn split_strided(
        parent: &Team,
        id: TeamId,
        start: u32,
        stride: u32,
        nranks: u32,
        my_pe: Pe,
        barrier_psync: SymAddr,
        collective_psync: SymAddr,
    ) -> Option<Self> {
        if stride == 0 && nranks > 1 {
            return None;
        }
        let members: Option<Vec<Pe>> = (0..nranks)
            .map(|i| {
                let parent_rank = start.checked_add(i.checked_mul(stride)?)?;
                parent.global_pe(parent_rank)
            })
            .collect();
        let members = members?;
        Some(Team::from_members(
            id,
            None,
            Some(parent.id),
            start,
            stride,
            members,
            my_pe,
            barrier_psync,
            collective_psync,
        ))
    }

    pub fn is_member(&self, pe: Pe) -> bool {
        self.rev.contains_key(&pe.as_u32())
    }

    /// Team rank -> global PE. Spec §3's "fwd map".
    pub fn global_pe(&self, rank: u32) -> Option<Pe> {
        self.fwd.get(rank as usize).copied()
    }

    /// Global PE -> team rank. Spec §3's "rev map".
    pub fn team_rank(&self, pe: Pe) -> Option<u32> {
        self.rev.get(&pe.as_u32()).copied()
    }

    pub fn members(&self) -> &[Pe] {
        &self.fwd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_fwd_rev_are_mutual_inverses() {
        let team = Team::world(6, Pe::new(2), SymAddr::new(0, 0), SymAddr::new(0, 256));
        assert_eq!(team.rank, Some(2));
        assert_eq!(team.nranks, 6);
        for r in 0..6 {
            let pe = team.global_pe(r).unwrap();
            assert_eq!(team.team_rank(pe), Some(r));
        }
    }

    #[test]
    fn shared_team_orders_members_as_supplied() {
        let peers = vec![Pe::new(4), Pe::new(1), Pe::new(7)];
        let team = Team::shared(peers.clone(), Pe::new(1), SymAddr::new(1, 0), SymAddr::new(1, 256));
        assert_eq!(team.rank, Some(1));
        assert_eq!(team.members(), peers.as_slice());
    }

    #[test]
    fn split_strided_picks_every_other_member() {
        let world = Team::world(8, Pe::new(0), SymAddr::new(0, 0), SymAddr::new(0, 256));
        let evens = Team::split_strided(
            &world,
            TeamId(2),
            0,
            2,
            4,
            Pe::new(4),
            SymAddr::new(2, 0),
            SymAddr::new(2, 256),
        )
        .unwrap();
        assert_eq!(evens.nranks, 4);
        assert_eq!(evens.rank, Some(2));
        assert_eq!(evens.members(), &[Pe::new(0), Pe::new(2), Pe::new(4), Pe::new(6)]);
    }

    #[test]
    fn split_strided_rejects_ranges_outside_parent() {
        let world = Team::world(4, Pe::new(0), SymAddr::new(0, 0), SymAddr::new(0, 256));
        assert!(
            Team::split_strided(&world, TeamId(2), 0, 1, 10, Pe::new(0), SymAddr::new(2, 0), SymAddr::new(2, 256))
                .is_none()
        );
    }

    #[test]
    fn non_member_has_no_rank() {
        let peers = vec![Pe::new(0), Pe::new(1)];
        let team = Team::shared(peers, Pe::new(9), SymAddr::new(1, 0), SymAddr::new(1, 256));
        assert_eq!(team.rank, None);
        assert!(!team.is_member(Pe::new(9)));
    }
}
