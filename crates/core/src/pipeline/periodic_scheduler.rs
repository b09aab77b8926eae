use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{select, Sender};

use crate::shared::error::PreviewError;

/// Runs a task on its own thread at a fixed interval until stopped.
///
/// The first run happens one interval after `start`. Stopping only prevents
/// new runs; a run in progress completes.
pub struct PeriodicScheduler {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl PeriodicScheduler {
    pub fn start(
        interval: Duration,
        mut task: impl FnMut() + Send + 'static,
    ) -> Result<Self, PreviewError> {
        if interval.is_zero() {
            return Err(PreviewError::InvalidInput(
                "detection interval must be positive".into(),
            ));
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let ticker = crossbeam_channel::tick(interval);
        let handle = std::thread::Builder::new()
            .name("detection-timer".into())
            .spawn(move || loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => task(),
                }
            })
            .map_err(|e| PreviewError::ThreadSpawn(format!("detection-timer: {e}")))?;

        log::debug!("Periodic detection every {interval:?}");
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stop(&mut self) {
        // Disconnecting the stop channel wakes the select.
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == std::thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::error!("Detection timer panicked");
            }
        }
    }
}

impl Drop for PeriodicScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
