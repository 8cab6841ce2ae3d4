//! Posts work back onto the dispatcher task (`spec.md` §4.8).
//!
//! Grounded on
//! `examples/original_source/include/unity/storage/provider/internal/MainLoopExecutor.h`:
//! the C++ original lets a `boost::future` continuation run "back in the
//! main thread" instead of on whatever worker thread resolved it. The
//! `tokio::task::LocalSet` dispatcher here plays the same role for
//! `Provider` implementations that do blocking work on `spawn_blocking` —
//! their completion is posted through this channel instead of touching
//! dispatcher-owned state directly from the blocking thread.

use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle used by any task to schedule a closure to run on the dispatcher.
#[derive(Clone)]
pub struct MainLoopExecutor {
    sender: mpsc::UnboundedSender<Job>,
}

/// Owned by the dispatcher task; call [`Self::run`] once to drain
/// submitted closures until every [`MainLoopExecutor`] handle is dropped.
pub struct MainLoopReceiver {
    receiver: mpsc::UnboundedReceiver<Job>,
}

impl MainLoopExecutor {
    /// Creates a linked executor handle / receiver pair.
    pub fn pair() -> (Self, MainLoopReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, MainLoopReceiver { receiver })
    }

    /// Schedules `job` to run on the dispatcher. Silently dropped if the
    /// dispatcher has already shut down.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        let _ = self.sender.send(Box::new(job));
    }
}

impl MainLoopReceiver {
    /// Runs submitted closures on the current task until every sender
    /// handle is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.receiver.recv().await {
            job();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn submitted_jobs_run_on_the_receiver_task() {
        let (executor, receiver) = MainLoopExecutor::pair();
        let counter = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&counter);
        executor.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        drop(executor);

        receiver.run().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn jobs_submitted_from_a_worker_task_are_observed() {
        let (executor, receiver) = MainLoopExecutor::pair();
        let counter = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&counter);
        let worker_executor = executor.clone();
        let worker = tokio::task::spawn_blocking(move || {
            worker_executor.submit(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        });
        worker.await.unwrap();
        drop(executor);

        receiver.run().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
