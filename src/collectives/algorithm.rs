//! Closed sum types for each family's selectable algorithm (spec §9
//! Design Notes: "prefer a closed sum type over string lookup in a
//! rewrite"). The configured name is parsed into one of these exactly
//! once, at init; every later dispatch matches on the enum, never the
//! string.

use crate::error::{OshmemError, Result};

fn unknown(family: &'static str, name: &str) -> OshmemError {
    OshmemError::RegistrationMiss { family, name: name.to_string() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierAlgorithm {
    Linear,
    CompleteTree,
    Binomial,
    KNomial,
    Dissemination,
}

impl BarrierAlgorithm {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(Self::Linear),
            "complete_tree" => Ok(Self::CompleteTree),
            "binomial_tree" => Ok(Self::Binomial),
            "knomial_tree" => Ok(Self::KNomial),
            "dissemination" => Ok(Self::Dissemination),
            _ => Err(unknown("barrier", name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastAlgorithm {
    Linear,
    CompleteTree,
    Binomial,
    KNomial,
    ScatterCollect,
}

impl BroadcastAlgorithm {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(Self::Linear),
            "complete_tree" => Ok(Self::CompleteTree),
            "binomial_tree" => Ok(Self::Binomial),
            "knomial_tree" => Ok(Self::KNomial),
            "scatter_collect" => Ok(Self::ScatterCollect),
            _ => Err(unknown("broadcast", name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectAlgorithm {
    Linear,
    AllLinear,
    RecursiveDoubling,
    RecursiveDoublingSignal,
    Ring,
    Bruck,
    BruckNoRotate,
    Simple,
}

impl CollectAlgorithm {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(Self::Linear),
            "all_linear" => Ok(Self::AllLinear),
            "recursive_doubling" => Ok(Self::RecursiveDoubling),
            "recursive_doubling_signal" => Ok(Self::RecursiveDoublingSignal),
            "ring" => Ok(Self::Ring),
            "bruck" => Ok(Self::Bruck),
            "bruck_no_rotate" => Ok(Self::BruckNoRotate),
            "simple" => Ok(Self::Simple),
            _ => Err(unknown("collect", name)),
        }
    }

    /// Whether this algorithm requires a power-of-two `nranks`.
    pub fn requires_power_of_two(self) -> bool {
        matches!(self, Self::RecursiveDoubling | Self::RecursiveDoublingSignal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FcollectAlgorithm {
    Linear,
    AllLinear,
    AllLinear1,
    RecursiveDoubling,
    Ring,
    Bruck,
    BruckNoRotate,
    BruckSignal,
    BruckInplace,
    NeighborExchange,
}

impl FcollectAlgorithm {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(Self::Linear),
            "all_linear" => Ok(Self::AllLinear),
            "all_linear1" => Ok(Self::AllLinear1),
            "recursive_doubling" => Ok(Self::RecursiveDoubling),
            "ring" => Ok(Self::Ring),
            "bruck" => Ok(Self::Bruck),
            "bruck_no_rotate" => Ok(Self::BruckNoRotate),
            "bruck_signal" => Ok(Self::BruckSignal),
            "bruck_inplace" => Ok(Self::BruckInplace),
            "neighbor_exchange" => Ok(Self::NeighborExchange),
            _ => Err(unknown("fcollect", name)),
        }
    }

    pub fn requires_power_of_two(self) -> bool {
        matches!(self, Self::RecursiveDoubling)
    }

    pub fn requires_even_nranks(self) -> bool {
        matches!(self, Self::NeighborExchange)
    }
}

/// The three all-to-all completion protocols (spec §4.3.5), orthogonal
/// to which pairwise-exchange schedule is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Barrier,
    Counter,
    Signal,
}

impl Completion {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "barrier" => Some(Self::Barrier),
            "counter" => Some(Self::Counter),
            "signal" => Some(Self::Signal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlltoallSchedule {
    ShiftExchange,
    XorPairwiseExchange,
    ColorPairwiseExchange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlltoallAlgorithm {
    pub schedule: AlltoallSchedule,
    pub completion: Completion,
}

impl AlltoallAlgorithm {
    /// Configured names are `"<schedule>_<completion>"`, e.g.
    /// `"shift_exchange_barrier"`, `"xor_pairwise_exchange_signal"`.
    pub fn parse(name: &str) -> Result<Self> {
        let (schedule_name, completion_name) =
            name.rsplit_once('_').ok_or_else(|| unknown("alltoall", name))?;
        let completion = Completion::parse(completion_name).ok_or_else(|| unknown("alltoall", name))?;
        let schedule = match schedule_name {
            "shift_exchange" => AlltoallSchedule::ShiftExchange,
            "xor_pairwise_exchange" => AlltoallSchedule::XorPairwiseExchange,
            "color_pairwise_exchange" => AlltoallSchedule::ColorPairwiseExchange,
            _ => return Err(unknown("alltoall", name)),
        };
        Ok(AlltoallAlgorithm { schedule, completion })
    }

    pub fn requires_power_of_two(self) -> bool {
        matches!(self.schedule, AlltoallSchedule::XorPairwiseExchange)
    }

    pub fn requires_even_nranks(self) -> bool {
        matches!(self.schedule, AlltoallSchedule::ColorPairwiseExchange)
    }
}

/// Strided all-to-all (`alltoalls`) reuses the same schedules and
/// completion protocols over strided source/destination addressing
/// (spec §4.3.5 "Strided alltoalls semantics").
pub type AlltoallsAlgorithm = AlltoallAlgorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceAlgorithm {
    Linear,
    Binomial,
    RecursiveDoubling,
    Rabenseifner,
    Rabenseifner2,
}

impl ReduceAlgorithm {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(Self::Linear),
            "binomial" => Ok(Self::Binomial),
            "recursive_doubling" => Ok(Self::RecursiveDoubling),
            "rabenseifner" => Ok(Self::Rabenseifner),
            "rabenseifner2" => Ok(Self::Rabenseifner2),
            _ => Err(unknown("reduce", name)),
        }
    }

    pub fn requires_power_of_two_core(self) -> bool {
        matches!(self, Self::RecursiveDoubling | Self::Rabenseifner | Self::Rabenseifner2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    And,
    Or,
    Xor,
    Min,
    Max,
    Sum,
    Prod,
}

impl ReduceOp {
    /// AND/OR/XOR are integer-only (spec §4.3.6).
    pub fn integer_only(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor)
    }
}
