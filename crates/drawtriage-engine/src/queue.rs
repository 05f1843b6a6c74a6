//! Serialized replay access.
//!
//! Replay controllers are stateful and single-context, so all analyses
//! go through one dedicated worker thread that owns the controller.
//! Submissions are processed strictly in order; each completion callback
//! runs exactly once, on the worker thread.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use drawtriage_replay::ReplayController;
use drawtriage_state::EventId;

use crate::analysis::{analyse_draw, AnalysisError};
use crate::trail::ResultStep;

type Completion = Box<dyn FnOnce(Result<Vec<ResultStep>, AnalysisError>) + Send>;

struct Job {
    eid: EventId,
    on_done: Completion,
}

/// Owns a replay controller on a worker thread and runs analyses against
/// it one at a time.
pub struct ReplayQueue {
    sender: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl ReplayQueue {
    pub fn new<R>(mut replay: R) -> Self
    where
        R: ReplayController + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name("drawtriage-replay".into())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    debug!(event = job.eid.0, "running queued analysis");
                    (job.on_done)(analyse_draw(&mut replay, job.eid));
                }
            })
            .expect("failed to spawn replay worker thread");
        ReplayQueue {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// Queue an analysis of the draw at `eid`. `on_done` is invoked with
    /// the outcome exactly once.
    pub fn submit<F>(&self, eid: EventId, on_done: F)
    where
        F: FnOnce(Result<Vec<ResultStep>, AnalysisError>) + Send + 'static,
    {
        let sender = self.sender.as_ref().expect("queue is shutting down");
        // A send failure means the worker panicked; surface it on join.
        let _ = sender.send(Job {
            eid,
            on_done: Box::new(on_done),
        });
    }

    /// Run one analysis synchronously through the queue.
    pub fn analyse_blocking(
        &self,
        eid: EventId,
    ) -> Result<Vec<ResultStep>, AnalysisError> {
        let (tx, rx) = mpsc::channel();
        self.submit(eid, move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.recv().expect("replay worker exited without replying")
    }
}

impl Drop for ReplayQueue {
    fn drop(&mut self) {
        // Close the channel so the worker drains pending jobs and exits.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use drawtriage_replay::fixtures::{d3d11_snapshot, gl_snapshot, vulkan_snapshot};
    use drawtriage_replay::ScriptedReplay;

    #[test]
    fn submissions_complete_in_order() {
        let queue = ReplayQueue::new(ScriptedReplay::new(d3d11_snapshot(EventId(100))));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for tag in 0..3u32 {
            let order = Arc::clone(&order);
            queue.submit(EventId(100), move |outcome| {
                assert!(outcome.is_ok());
                order.lock().unwrap().push(tag);
            });
        }
        drop(queue);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn callback_runs_exactly_once_per_submission() {
        let queue = ReplayQueue::new(ScriptedReplay::new(vulkan_snapshot(EventId(100))));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);
        queue.submit(EventId(100), move |_| {
            calls_in.fetch_add(1, Ordering::SeqCst);
        });
        drop(queue);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blocking_analysis_returns_a_trail() {
        let queue = ReplayQueue::new(ScriptedReplay::new(gl_snapshot(EventId(100))));
        let steps = queue.analyse_blocking(EventId(100)).unwrap();
        assert!(!steps.is_empty());
    }
}
