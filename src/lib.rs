//! `oshmem`: a PGAS runtime implementing the OpenSHMEM programming model.
//!
//! Each process ("PE") exposes one or more symmetric heaps and coordinates
//! with its peers through one-sided put/get, atomic memory operations, and
//! collective operations (barrier, broadcast, reduce, all-to-all, collect).
//!
//! This crate does not implement the network transport itself — see
//! [`transport::Transport`] for the capability it expects from one. The
//! `sim-transport` feature (default, via [`oshmem_transport_sim`]) wires up
//! an in-process reference transport suitable for tests and single-machine
//! development.
//!
//! # Usage
//!
//! ```ignore
//! let engine = oshmem::Engine::init(transport, config)?;
//! engine.collectives().barrier(engine.world())?;
//! ```

pub mod collectives;
pub mod config;
pub mod engine;
pub mod error;
pub mod heap;
pub mod lock;
pub mod macros;
pub mod pe;
#[cfg(feature = "sim-transport")]
pub mod sim;
pub mod stats;
pub mod sync;
pub mod team;
pub mod transport;
pub mod tree;

pub use config::Config;
pub use engine::Engine;
pub use error::{OshmemError, Result};
pub use pe::Pe;
pub use team::{Team, TeamId};
pub use transport::Transport;

include!(concat!(env!("OUT_DIR"), "/default_algorithms.rs"));
