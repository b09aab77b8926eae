//! Hands work back to the thread that owns the display.
//!
//! The host creates a [`DisplayLoop`] on its display thread and pumps it;
//! other threads post closures through a [`DisplayHandle`].

use std::marker::PhantomData;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

pub type DisplayTask = Box<dyn FnOnce() + Send + 'static>;

/// Task queue bound to the thread that created it. Not `Send`.
pub struct DisplayLoop {
    tx: Sender<DisplayTask>,
    rx: Receiver<DisplayTask>,
    owner: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl DisplayLoop {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            owner: thread::current().id(),
            _not_send: PhantomData,
        }
    }

    pub fn handle(&self) -> DisplayHandle {
        DisplayHandle {
            tx: self.tx.clone(),
            context: self.owner,
        }
    }

    pub fn context_id(&self) -> ThreadId {
        self.owner
    }

    /// Runs every task already queued. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Waits up to `timeout` for one task and runs it.
    pub fn run_next(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Runs tasks as they arrive until `deadline`.
    pub fn run_until(&self, deadline: Instant) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.recv_deadline(deadline) {
            task();
            ran += 1;
        }
        ran
    }

    /// Runs tasks until `done` holds or `timeout` elapses. Returns whether
    /// `done` held.
    pub fn run_while_pending(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.run_next((deadline - now).min(Duration::from_millis(10)));
        }
    }
}

impl Default for DisplayLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable sender half of a [`DisplayLoop`].
#[derive(Clone)]
pub struct DisplayHandle {
    tx: Sender<DisplayTask>,
    context: ThreadId,
}

impl DisplayHandle {
    /// Queues `task` on the display thread. Returns `false` once the loop
    /// has been dropped.
    pub fn post(&self, task: DisplayTask) -> bool {
        self.tx.send(task).is_ok()
    }

    /// Identity of the display-owning thread.
    pub fn context_id(&self) -> ThreadId {
        self.context
    }
}
