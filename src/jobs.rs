//! Background job queue
//!
//! Jobs are pushed onto an unbounded channel and executed one at a time by a
//! worker task. Dispatching never waits for the job to run.
//!
//! Every job carries a uniqueness key. While a job with a given key is queued
//! or running, further dispatches with the same key are refused, so at most
//! one sync can be in flight at a time.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::metrics::{JOBS_DISPATCHED_TOTAL, JOBS_PROCESSED_TOTAL};
use crate::service::SyncService;

/// Work the queue can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    /// Refresh the local mirror from the upstream feed
    SyncPosts,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::SyncPosts => "sync_posts",
        }
    }

    pub fn unique_key(&self) -> &'static str {
        match self {
            Job::SyncPosts => "sync_posts",
        }
    }
}

/// Outcome of a dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Job accepted and queued
    Queued,
    /// An identical job is already queued or running
    AlreadyPending,
    /// Worker is gone; the job was dropped
    Closed,
}

type InFlight = Arc<Mutex<HashSet<&'static str>>>;

/// Sending half of the queue; cheap to clone into handlers
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<Job>,
    in_flight: InFlight,
}

/// Receiving half of the queue, owned by the worker
pub struct JobReceiver {
    receiver: mpsc::UnboundedReceiver<Job>,
    in_flight: InFlight,
}

/// Create a connected queue/receiver pair
pub fn channel() -> (JobQueue, JobReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let in_flight: InFlight = Arc::default();

    (
        JobQueue {
            sender,
            in_flight: in_flight.clone(),
        },
        JobReceiver {
            receiver,
            in_flight,
        },
    )
}

impl JobQueue {
    /// Queue `job` unless an identical one is already in flight
    pub fn dispatch(&self, job: Job) -> Dispatch {
        let key = job.unique_key();

        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if !in_flight.insert(key) {
                JOBS_DISPATCHED_TOTAL
                    .with_label_values(&[job.name(), "already_pending"])
                    .inc();
                tracing::debug!(job = job.name(), "Job already pending; dispatch skipped");
                return Dispatch::AlreadyPending;
            }
        }

        if self.sender.send(job).is_err() {
            release(&self.in_flight, key);
            JOBS_DISPATCHED_TOTAL
                .with_label_values(&[job.name(), "closed"])
                .inc();
            tracing::error!(job = job.name(), "Job worker is not running; job dropped");
            return Dispatch::Closed;
        }

        JOBS_DISPATCHED_TOTAL
            .with_label_values(&[job.name(), "queued"])
            .inc();
        tracing::info!(job = job.name(), "Job dispatched");
        Dispatch::Queued
    }

    /// Whether `job` is currently queued or running
    pub fn is_pending(&self, job: Job) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(job.unique_key())
    }
}

impl JobReceiver {
    /// Wait for the next job
    pub async fn recv(&mut self) -> Option<Job> {
        self.receiver.recv().await
    }

    /// Take a queued job without waiting
    pub fn try_recv(&mut self) -> Option<Job> {
        self.receiver.try_recv().ok()
    }

    /// Release the uniqueness key of a finished job
    pub fn complete(&self, job: Job) {
        release(&self.in_flight, job.unique_key());
    }
}

fn release(in_flight: &InFlight, key: &'static str) {
    in_flight
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(key);
}

/// Spawn the background worker
///
/// Runs until every `JobQueue` handle is dropped.
pub fn spawn_worker(receiver: JobReceiver, sync: Arc<SyncService>) -> JoinHandle<()> {
    spawn_worker_with(receiver, move |job| {
        let sync = sync.clone();
        async move {
            match job {
                Job::SyncPosts => sync.sync_posts().await,
            }
        }
    })
}

/// Worker loop around an arbitrary job runner
///
/// Each job runs in its own task. A panicking job counts as a failure and
/// its uniqueness key is still released.
fn spawn_worker_with<F, Fut>(mut receiver: JobReceiver, run: F) -> JoinHandle<()>
where
    F: Fn(Job) -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            tracing::info!(job = job.name(), "Processing job");

            let succeeded = match tokio::spawn(run(job)).await {
                Ok(succeeded) => succeeded,
                Err(error) => {
                    tracing::error!(job = job.name(), %error, "Job aborted");
                    false
                }
            };

            let status = if succeeded { "success" } else { "failure" };
            JOBS_PROCESSED_TOTAL
                .with_label_values(&[job.name(), status])
                .inc();
            tracing::info!(job = job.name(), status, "Job finished");

            receiver.complete(job);
        }

        tracing::info!("Job queue closed; worker exiting");
    });

    tracing::info!("Job worker spawned");
    handle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_queues_job() {
        let (queue, mut receiver) = channel();

        assert_eq!(queue.dispatch(Job::SyncPosts), Dispatch::Queued);
        assert!(queue.is_pending(Job::SyncPosts));
        assert_eq!(receiver.try_recv(), Some(Job::SyncPosts));
    }

    #[test]
    fn duplicate_dispatch_is_refused_while_pending() {
        let (queue, mut receiver) = channel();

        assert_eq!(queue.dispatch(Job::SyncPosts), Dispatch::Queued);
        assert_eq!(queue.dispatch(Job::SyncPosts), Dispatch::AlreadyPending);

        assert_eq!(receiver.try_recv(), Some(Job::SyncPosts));
        assert_eq!(receiver.try_recv(), None);
    }

    #[test]
    fn completion_allows_next_dispatch() {
        let (queue, mut receiver) = channel();

        queue.dispatch(Job::SyncPosts);
        let job = receiver.try_recv().unwrap();
        // Still pending while the worker holds it
        assert_eq!(queue.dispatch(Job::SyncPosts), Dispatch::AlreadyPending);

        receiver.complete(job);
        assert!(!queue.is_pending(Job::SyncPosts));
        assert_eq!(queue.dispatch(Job::SyncPosts), Dispatch::Queued);
    }

    #[test]
    fn dispatch_after_worker_dropped_reports_closed() {
        let (queue, receiver) = channel();
        drop(receiver);

        assert_eq!(queue.dispatch(Job::SyncPosts), Dispatch::Closed);
        assert!(!queue.is_pending(Job::SyncPosts));
    }

    #[test]
    fn concurrent_dispatch_queues_exactly_once() {
        let (queue, mut receiver) = channel();

        let outcomes: Vec<Dispatch> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let queue = queue.clone();
                    scope.spawn(move || queue.dispatch(Job::SyncPosts))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let queued = outcomes.iter().filter(|o| **o == Dispatch::Queued).count();
        assert_eq!(queued, 1);
        assert!(receiver.try_recv().is_some());
        assert!(receiver.try_recv().is_none());
    }

    async fn wait_until_idle(queue: &JobQueue) {
        for _ in 0..100 {
            if !queue.is_pending(Job::SyncPosts) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("job never completed");
    }

    #[tokio::test]
    async fn panicking_job_releases_key_and_worker_survives() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let (queue, receiver) = channel();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let _worker = spawn_worker_with(receiver, move |_job| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    panic!("first run blows up");
                }
                true
            }
        });

        assert_eq!(queue.dispatch(Job::SyncPosts), Dispatch::Queued);
        wait_until_idle(&queue).await;

        assert_eq!(queue.dispatch(Job::SyncPosts), Dispatch::Queued);
        wait_until_idle(&queue).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
