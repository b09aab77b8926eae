use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use crate::shared::error::PreviewError;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A named background thread that runs posted jobs one at a time, in the
/// order they were posted.
///
/// Used as the callback context of the software cameras and as the
/// pipeline's detection worker. Dropping it lets queued jobs finish and
/// joins the thread, unless the drop happens on that thread itself.
pub struct JobThread {
    name: String,
    tx: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl JobThread {
    pub fn spawn(name: &str) -> Result<Self, PreviewError> {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in rx {
                    job();
                }
            })
            .map_err(|e| PreviewError::ThreadSpawn(format!("{name}: {e}")))?;
        Ok(Self {
            name: name.to_string(),
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Returns `false` when the thread has already shut down.
    pub fn post(&self, job: Job) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.send(job).is_ok())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for JobThread {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == std::thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::error!("Thread {} panicked", self.name);
            }
        }
    }
}
