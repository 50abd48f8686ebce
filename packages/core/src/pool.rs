//! Bounded worker pool
//!
//! A fixed number of permits gates how many submitted tasks run at once; the
//! rest wait in the runtime's queue. Submitting never blocks.
//!
//! Every task is isolated: a panic is caught at the task boundary and handed
//! to the task's abort callback instead of unwinding into the pool. With a
//! batch deadline set, a task that has not started by the deadline never
//! starts and its abort callback receives [`AbortCause::Cancelled`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Why a submitted task did not complete normally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortCause {
    /// The task panicked; carries the panic message
    Panicked(String),
    /// The batch deadline passed before the task got a slot
    Cancelled,
}

/// N concurrent slots draining an unbounded queue
#[derive(Debug)]
pub struct WorkerPool {
    size: usize,
    semaphore: Arc<Semaphore>,
    deadline: Option<Instant>,
    tasks: JoinSet<()>,
    in_flight: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Create a pool with `size` slots (0 is treated as 1)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            semaphore: Arc::new(Semaphore::new(size)),
            deadline: None,
            tasks: JoinSet::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Builder pattern: cancel tasks that have not started by `deadline`
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks submitted but not yet finished, queued ones included
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Queue a task
    ///
    /// `on_abort` runs instead of completing the task's own reporting when the
    /// task panics or is cancelled by the deadline.
    pub fn submit<F, A>(&mut self, task: F, on_abort: A)
    where
        F: Future<Output = ()> + Send + 'static,
        A: FnOnce(AbortCause) + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let deadline = self.deadline;
        let in_flight = Arc::clone(&self.in_flight);

        in_flight.fetch_add(1, Ordering::SeqCst);

        self.tasks.spawn(async move {
            let _guard = scopeguard::guard((), |_| {
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });

            let Some(_permit) = acquire(semaphore, deadline).await else {
                tracing::debug!("Batch deadline passed before task started");
                on_abort(AbortCause::Cancelled);
                return;
            };

            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                let message = panic_message(panic.as_ref());
                tracing::error!(panic = %message, "Worker task panicked");
                on_abort(AbortCause::Panicked(message));
            }
        });
    }

    /// Wait for every submitted task to finish
    pub async fn drain(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(join_error) = result {
                tracing::error!(error = %join_error, "Worker task failed to join");
            }
        }
    }
}

/// Wait for a slot, giving up at the deadline
async fn acquire(
    semaphore: Arc<Semaphore>,
    deadline: Option<Instant>,
) -> Option<OwnedSemaphorePermit> {
    match deadline {
        None => semaphore.acquire_owned().await.ok(),
        Some(deadline) => {
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::timeout_at(deadline, semaphore.acquire_owned())
                .await
                .ok()?
                .ok()
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn concurrency_never_exceeds_pool_size() {
        let mut pool = WorkerPool::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let done = Arc::clone(&done);
            pool.submit(
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    done.fetch_add(1, Ordering::SeqCst);
                },
                |_| {},
            );
        }

        pool.drain().await;

        assert_eq!(pool.in_flight(), 0);
        assert_eq!(done.load(Ordering::SeqCst), 20);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 3, "peak concurrency was {peak}");
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let mut pool = WorkerPool::new(2);
        let aborted = Arc::new(Mutex::new(Vec::new()));
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..4 {
            let aborted = Arc::clone(&aborted);
            let done = Arc::clone(&done);
            pool.submit(
                async move {
                    if i == 1 {
                        panic!("host {i} exploded");
                    }
                    done.fetch_add(1, Ordering::SeqCst);
                },
                move |cause| aborted.lock().unwrap().push((i, cause)),
            );
        }
        pool.drain().await;

        assert_eq!(done.load(Ordering::SeqCst), 3);
        let aborted = aborted.lock().unwrap();
        assert_eq!(
            *aborted,
            vec![(1, AbortCause::Panicked("host 1 exploded".to_string()))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn queued_tasks_cancel_at_deadline() {
        let deadline = Instant::now() + Duration::from_millis(50);
        let mut pool = WorkerPool::new(1).with_deadline(deadline);
        let causes = Arc::new(Mutex::new(Vec::new()));
        let ran = Arc::new(AtomicUsize::new(0));

        for i in 0..3 {
            let causes = Arc::clone(&causes);
            let ran = Arc::clone(&ran);
            pool.submit(
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                },
                move |cause| causes.lock().unwrap().push((i, cause)),
            );
        }
        pool.drain().await;

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(causes.lock().unwrap().len(), 2);
        assert!(
            causes
                .lock()
                .unwrap()
                .iter()
                .all(|(_, c)| *c == AbortCause::Cancelled)
        );

        // Past the deadline, even a free slot does not start new work
        let late = Arc::new(AtomicUsize::new(0));
        let late_task = Arc::clone(&late);
        let cancelled = Arc::new(AtomicUsize::new(0));
        let cancelled_cb = Arc::clone(&cancelled);
        pool.submit(
            async move {
                late_task.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                cancelled_cb.fetch_add(1, Ordering::SeqCst);
            },
        );
        pool.drain().await;
        assert_eq!(late.load(Ordering::SeqCst), 0);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn zero_size_means_one_slot() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }
}
