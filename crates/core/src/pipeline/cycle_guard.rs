use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::shared::sync::lock;

/// Where the current capture cycle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    AwaitingFrame,
    Transcoding,
    Detecting,
    Delivering,
}

impl CycleState {
    pub fn is_idle(self) -> bool {
        self == CycleState::Idle
    }
}

struct Cycle {
    state: CycleState,
    generation: u64,
    started: Instant,
}

/// Admits at most one capture cycle at a time.
///
/// Each admitted cycle gets a generation number. Transitions carry the
/// generation, so steps belonging to a superseded cycle are refused.
pub struct CycleGuard {
    cycle: Mutex<Cycle>,
    idle: Condvar,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self {
            cycle: Mutex::new(Cycle {
                state: CycleState::Idle,
                generation: 0,
                started: Instant::now(),
            }),
            idle: Condvar::new(),
        }
    }

    /// Starts a new cycle in `AwaitingFrame`.
    ///
    /// Fails with the current state while a cycle is in flight. With a
    /// `frame_timeout`, a cycle that has waited that long for its frame is
    /// superseded instead. Later stages are never superseded.
    pub fn try_begin(&self, frame_timeout: Option<Duration>) -> Result<u64, CycleState> {
        let mut cycle = lock(&self.cycle);
        let stalled = cycle.state == CycleState::AwaitingFrame
            && frame_timeout.is_some_and(|timeout| cycle.started.elapsed() >= timeout);

        if !cycle.state.is_idle() && !stalled {
            return Err(cycle.state);
        }
        if stalled {
            log::warn!(
                "No frame for cycle {} after {:?}, superseding it",
                cycle.generation,
                cycle.started.elapsed()
            );
        }

        cycle.generation += 1;
        cycle.state = CycleState::AwaitingFrame;
        cycle.started = Instant::now();
        Ok(cycle.generation)
    }

    /// Moves cycle `generation` to `to`. Returns `false` if that cycle is no
    /// longer current.
    pub fn advance(&self, generation: u64, to: CycleState) -> bool {
        let mut cycle = lock(&self.cycle);
        if cycle.generation != generation || cycle.state.is_idle() {
            return false;
        }
        cycle.state = to;
        true
    }

    /// Returns cycle `generation` to `Idle`, successful or not.
    pub fn finish(&self, generation: u64) -> bool {
        let mut cycle = lock(&self.cycle);
        if cycle.generation != generation {
            return false;
        }
        cycle.state = CycleState::Idle;
        self.idle.notify_all();
        true
    }

    pub fn state(&self) -> CycleState {
        lock(&self.cycle).state
    }

    /// Blocks until no cycle is in flight. Returns `false` on timeout.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let cycle = lock(&self.cycle);
        let (cycle, _) = self
            .idle
            .wait_timeout_while(cycle, timeout, |c| !c.state.is_idle())
            .unwrap_or_else(PoisonError::into_inner);
        cycle.state.is_idle()
    }
}

impl Default for CycleGuard {
    fn default() -> Self {
        Self::new()
    }
}
