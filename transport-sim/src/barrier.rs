//! A reusable (cyclic) barrier for a fixed set of participants, built on
//! a condvar rather than a spin loop since simulated PEs are plain OS
//! threads and we want real threads to actually sleep between phases.

use std::sync::{Condvar, Mutex};

struct State {
    count: usize,
    generation: u64,
}

pub struct CyclicBarrier {
    parties: usize,
    state: Mutex<State>,
    cond: Condvar,
}

impl CyclicBarrier {
    pub fn new(parties: usize) -> Self {
        CyclicBarrier {
            parties,
            state: Mutex::new(State { count: 0, generation: 0 }),
            cond: Condvar::new(),
        }
    }

    /// Blocks until `parties` callers have called `wait` for the current
    /// generation, then releases all of them and advances to the next
    /// generation.
    pub fn wait(&self) {
        if self.parties <= 1 {
            return;
        }
        let mut state = self.state.lock().expect("barrier mutex poisoned");
        let generation = state.generation;
        state.count += 1;
        if state.count == self.parties {
            state.count = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cond.notify_all();
            return;
        }
        while state.generation == generation {
            state = self.cond.wait(state).expect("barrier mutex poisoned");
        }
    }
}
