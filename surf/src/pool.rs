//! Fixed-size worker pool for scatter-gather searches.
//!
//! A pool is built, loaded with jobs, run once and dropped. `run_all` starts
//! at most `min(workers, jobs)` scoped OS threads that pull jobs from a
//! channel and returns once every job has run exactly once. Jobs may borrow
//! from the caller's stack: the backend client and matcher are shared by
//! reference for the duration of the run.
//!
//! The pool has no error type. Jobs report their outcome through a channel
//! owned by the caller.

use crossbeam_channel::bounded;
use std::thread;
use tracing::{debug, trace};

type Job<'a> = Box<dyn FnOnce() + Send + 'a>;

pub struct WorkerPool<'a> {
    workers: usize,
    jobs: Vec<Job<'a>>,
}

impl<'a> WorkerPool<'a> {
    /// Creates a pool with `workers` executors (at least one).
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            jobs: Vec::new(),
        }
    }

    /// Queues a job. Nothing runs until [`WorkerPool::run_all`].
    pub fn submit<F>(&mut self, job: F)
    where
        F: FnOnce() + Send + 'a,
    {
        self.jobs.push(Box::new(job));
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Number of threads `run_all` will start.
    pub fn effective_workers(&self) -> usize {
        self.workers.min(self.jobs.len())
    }

    /// Runs every submitted job and blocks until all of them have completed.
    pub fn run_all(self) {
        let workers = self.effective_workers();
        if workers == 0 {
            return;
        }

        let total = self.jobs.len();
        let (tx, rx) = bounded::<Job<'a>>(total);
        for job in self.jobs {
            // capacity equals the job count, the send never blocks
            let _ = tx.send(job);
        }
        // workers stop once the queue is drained and disconnected
        drop(tx);

        debug!(workers, jobs = total, "running worker pool");
        thread::scope(|scope| {
            for id in 0..workers {
                let rx = rx.clone();
                scope.spawn(move || {
                    trace!(worker = id, "started single worker");
                    for job in rx.iter() {
                        job();
                        trace!(worker = id, "job done");
                    }
                });
            }
        });
        debug!(jobs = total, "worker pool finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_all_jobs_run_exactly_once() {
        for workers in [1, 2, 3, 8, 32] {
            for jobs in [1, 2, 7, 50] {
                let done = AtomicUsize::new(0);
                let hits: Vec<AtomicUsize> = (0..jobs).map(|_| AtomicUsize::new(0)).collect();

                let mut pool = WorkerPool::new(workers);
                for hit in &hits {
                    let done = &done;
                    pool.submit(move || {
                        hit.fetch_add(1, Ordering::SeqCst);
                        done.fetch_add(1, Ordering::SeqCst);
                    });
                }
                pool.run_all();

                assert_eq!(done.load(Ordering::SeqCst), jobs);
                assert!(hits.iter().all(|h| h.load(Ordering::SeqCst) == 1));
            }
        }
    }

    #[test]
    fn test_workers_clamped_to_job_count() {
        let threads = Mutex::new(HashSet::new());
        let mut pool = WorkerPool::new(16);
        for _ in 0..3 {
            let threads = &threads;
            pool.submit(move || {
                threads.lock().unwrap().insert(thread::current().id());
            });
        }
        assert_eq!(pool.effective_workers(), 3);
        pool.run_all();
        assert!(threads.lock().unwrap().len() <= 3);
    }

    #[test]
    fn test_zero_workers_coerced_to_one() {
        let done = AtomicUsize::new(0);
        let mut pool = WorkerPool::new(0);
        for _ in 0..4 {
            let done = &done;
            pool.submit(move || {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(pool.effective_workers(), 1);
        pool.run_all();
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_empty_pool_returns_immediately() {
        let pool = WorkerPool::new(4);
        assert!(pool.is_empty());
        pool.run_all();
    }
}
