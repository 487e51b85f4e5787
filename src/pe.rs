//! PE (processing element) identity (spec §3).
//!
//! A PE number is stable for the program lifetime and is always in
//! `[0, n_pes())`. Kept as a newtype over `u32` rather than a bare integer
//! so team rank/global-PE confusion is a type error, not a logic bug.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pe(pub u32);

impl Pe {
    pub const fn new(raw: u32) -> Self {
        Pe(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Pe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pe{}", self.0)
    }
}

impl From<u32> for Pe {
    fn from(raw: u32) -> Self {
        Pe(raw)
    }
}
