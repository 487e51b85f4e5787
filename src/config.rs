//! Runtime configuration consumed at `Engine::init` (spec §6).
//!
//! Parsing environment variables into this struct is explicitly out of
//! scope (spec §1, §6: "handled by a collaborator"); this module only
//! defines the shape the collaborator populates and the build-time
//! defaults (`build.rs` / `oshmem.toml`) used when a field is left unset.

use serde::Deserialize;

/// One entry per collective family named in spec §4.3; the algorithm name
/// is validated and parsed into a closed enum variant
/// ([`crate::collectives::algorithm`]) once, at init.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_barrier")]
    pub barrier_algorithm: String,
    #[serde(default = "default_sync")]
    pub sync_algorithm: String,
    #[serde(default = "default_broadcast")]
    pub broadcast_algorithm: String,
    #[serde(default = "default_collect")]
    pub collect_algorithm: String,
    #[serde(default = "default_fcollect")]
    pub fcollect_algorithm: String,
    #[serde(default = "default_alltoall")]
    pub alltoall_algorithm: String,
    #[serde(default = "default_alltoalls")]
    pub alltoalls_algorithm: String,
    #[serde(default = "default_reduce")]
    pub reduce_algorithm: String,

    /// Tree degree used by complete-tree / k-nomial-tree algorithms
    /// (spec §4.3.2 default radix = 2).
    #[serde(default = "default_radix")]
    pub tree_radix: u32,

    /// Bytes reserved per heap's free-list metadata; purely a sizing
    /// sanity bound, not enforced by the allocator itself.
    #[serde(default = "default_heap_capacity")]
    pub default_heap_capacity: usize,

    /// Whether the engine takes a process-wide mutex around every public
    /// entry point (spec §5: "if built in multi-threaded mode").
    #[serde(default = "default_multithreaded")]
    pub multithreaded: bool,
}

fn builtin(family: &str) -> String {
    crate::BUILTIN_DEFAULT_ALGORITHMS
        .iter()
        .find(|(f, _)| *f == family)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| panic!("no built-in default for family {family:?}"))
}

fn default_barrier() -> String {
    builtin("barrier")
}
fn default_sync() -> String {
    builtin("sync")
}
fn default_broadcast() -> String {
    builtin("broadcast")
}
fn default_collect() -> String {
    builtin("collect")
}
fn default_fcollect() -> String {
    builtin("fcollect")
}
fn default_alltoall() -> String {
    builtin("alltoall")
}
fn default_alltoalls() -> String {
    builtin("alltoalls")
}
fn default_reduce() -> String {
    builtin("reduce")
}
fn default_radix() -> u32 {
    2
}
fn default_heap_capacity() -> usize {
    64 * 1024 * 1024
}
fn default_multithreaded() -> bool {
    false
}

impl Default for Config {
    fn default() -> Self {
        Config {
            barrier_algorithm: default_barrier(),
            sync_algorithm: default_sync(),
            broadcast_algorithm: default_broadcast(),
            collect_algorithm: default_collect(),
            fcollect_algorithm: default_fcollect(),
            alltoall_algorithm: default_alltoall(),
            alltoalls_algorithm: default_alltoalls(),
            reduce_algorithm: default_reduce(),
            tree_radix: default_radix(),
            default_heap_capacity: default_heap_capacity(),
            multithreaded: default_multithreaded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_builtin_table() {
        let cfg = Config::default();
        assert_eq!(cfg.barrier_algorithm, "binomial_tree");
        assert_eq!(cfg.reduce_algorithm, "binomial");
        assert_eq!(cfg.tree_radix, 2);
    }

    #[test]
    fn deserializes_partial_toml() {
        let cfg: Config = toml::from_str("collect_algorithm = \"bruck\"\n").unwrap();
        assert_eq!(cfg.collect_algorithm, "bruck");
        assert_eq!(cfg.barrier_algorithm, "binomial_tree");
    }
}
