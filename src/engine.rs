//! The process-wide singleton (spec §9 Design Notes: "model the
//! dispatch record and per-PE process info as an `Engine` value owned by
//! the PE's init routine; public entry points borrow it").
//!
//! `Engine` owns: the transport handle, the heap registry, the
//! dispatch record (parsed once from [`Config`]), and the two
//! predefined teams. In multi-threaded builds (`Config::multithreaded`)
//! a single process-wide mutex serializes every public entry point
//! (spec §5); the single-threaded default pays no locking cost.

use crate::collectives::DispatchRecord;
use crate::config::Config;
use crate::error::{OshmemError, Result};
use crate::heap::Registry;
use crate::pe::Pe;
use crate::sync::SpinMutex;
use crate::team::{self, Team, TeamId};
use crate::transport::{SymAddr, Transport};

/// Heap reserved for teams' pSync arrays — never exposed to user
/// `malloc`/`free`; sized generously since pSync words are tiny and
/// only predefined teams plus a handful of splits typically exist.
pub(crate) const PSYNC_HEAP_CAPACITY: usize = 1 << 20;
const PSYNC_HEAP_NAME: &str = "oshmem.internal.psync";

impl<T: Transport> std::fmt::Debug for Engine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

pub struct Engine<T: Transport> {
    transport: T,
    pub heaps: Registry,
    pub dispatch: DispatchRecord,
    /// Held around every public entry point when `Config::multithreaded`
    /// is set (spec §5); `()` payload, the mutex itself is the resource.
    big_lock: Option<SpinMutex<()>>,
    psync_heap_index: usize,
    next_team_id: std::sync::atomic::AtomicU32,
    world: Team,
}

impl<T: Transport> Engine<T> {
    /// Validates `config`, builds the dispatch record, reserves the
    /// internal pSync heap, and constructs the `WORLD` team. Any
    /// unknown algorithm name in `config` is a registration miss — spec
    /// §7 kind 4, fatal.
    ///
    /// Assumes `transport` can already address a heap at index 0 sized
    /// at least [`PSYNC_HEAP_CAPACITY`] — this heap is never negotiated
    /// at runtime (the `Transport` trait has no such operation; a real
    /// deployment's symmetric heap is mapped before `init` ever runs).
    /// `sim-transport` stands in for that by reserving it eagerly inside
    /// [`crate::sim::SimTransport::new`].
    pub fn init(transport: T, config: &Config) -> Result<Self> {
        let dispatch = DispatchRecord::build(config)?;

        let heaps = Registry::new();
        let psync_heap_index = heaps.name_to_index(PSYNC_HEAP_NAME);
        // The pSync heap's base is irrelevant to callers (they never see
        // it directly), so a process-local allocation backs it even
        // though `Heap::init` ordinarily wants a caller-supplied,
        // cluster-symmetric base; every PE performs the identical
        // sequence of allocations below, which is what symmetry actually
        // requires here.
        let base = Box::leak(vec![0u8; PSYNC_HEAP_CAPACITY].into_boxed_slice());
        let base_ptr = std::ptr::NonNull::new(base.as_mut_ptr()).expect("leaked box is never null");
        unsafe {
            heaps
                .heap(psync_heap_index)
                .init(base_ptr, PSYNC_HEAP_CAPACITY)
                .map_err(|e| OshmemError::InvalidArgument(format!("psync heap init failed: {e:?}")))?;
        }

        let my_pe = transport.my_pe();
        let n_pes = transport.n_pes();
        let (barrier_psync, collective_psync) = Self::alloc_psync_pair(&heaps, psync_heap_index)?;
        team::init_psync(&transport, barrier_psync)?;
        team::init_psync(&transport, collective_psync)?;
        let world = Team::world(n_pes, my_pe, barrier_psync, collective_psync);

        let big_lock = if config.multithreaded { Some(SpinMutex::new(())) } else { None };

        Ok(Engine {
            transport,
            heaps,
            dispatch,
            big_lock,
            psync_heap_index,
            next_team_id: std::sync::atomic::AtomicU32::new(2), // 0=WORLD, 1=SHARED
            world,
        })
    }

    fn alloc_psync_pair(heaps: &Registry, heap_index: usize) -> Result<(SymAddr, SymAddr)> {
        let words = team::PSYNC_WORDS * 8;
        let heap = heaps.heap(heap_index);
        let barrier = heap.malloc(words);
        let collective = heap.malloc(words);
        if barrier.is_null() || collective.is_null() {
            return Err(OshmemError::AllocationFailed { requested: words * 2 });
        }
        let base = heap.base() as usize;
        let barrier_off = barrier as usize - base;
        let collective_off = collective as usize - base;
        Ok((
            SymAddr::new(heap_index as u32, barrier_off),
            SymAddr::new(heap_index as u32, collective_off),
        ))
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn my_pe(&self) -> Pe {
        self.transport.my_pe()
    }

    pub fn n_pes(&self) -> u32 {
        self.transport.n_pes()
    }

    pub fn world(&self) -> &Team {
        &self.world
    }

    /// Builds the predefined `SHARED` team from an externally-supplied
    /// node-local peer set (spec §1: node-local peer sets are a
    /// bootstrap collaborator's responsibility).
    pub fn make_shared_team(&self, node_peers: Vec<Pe>) -> Result<Team> {
        let (barrier_psync, collective_psync) = Self::alloc_psync_pair(&self.heaps, self.psync_heap_index)?;
        team::init_psync(&self.transport, barrier_psync)?;
        team::init_psync(&self.transport, collective_psync)?;
        Ok(Team::shared(node_peers, self.my_pe(), barrier_psync, collective_psync))
    }

    /// Derives a strided sub-team of `parent` (spec §3).
    pub fn split_strided(&self, parent: &Team, start: u32, stride: u32, nranks: u32) -> Result<Team> {
        let (barrier_psync, collective_psync) = Self::alloc_psync_pair(&self.heaps, self.psync_heap_index)?;
        team::init_psync(&self.transport, barrier_psync)?;
        team::init_psync(&self.transport, collective_psync)?;
        let id = TeamId(self.next_team_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed));
        Team::split_strided(parent, id, start, stride, nranks, self.my_pe(), barrier_psync, collective_psync)
            .ok_or_else(|| OshmemError::InvalidArgument("split_strided range outside parent team".into()))
    }

    /// Runs `f` with the process-wide lock held when multi-threaded mode
    /// is enabled (spec §5); a no-op wrapper in the single-threaded
    /// default. Every public collective/lock entry point should be
    /// called through this.
    pub fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.big_lock {
            Some(lock) => {
                let _guard = lock.lock();
                f()
            }
            None => f(),
        }
    }

    /// A thin facade binding this engine's transport and resolved
    /// dispatch record to the collective family modules, so callers
    /// don't thread both through every call site themselves.
    pub fn collectives(&self) -> crate::collectives::CollectiveOps<'_, T> {
        crate::collectives::CollectiveOps::new(&self.transport, &self.dispatch)
    }
}
