//! Fixed-size pool of worker threads.

use crate::error::{KernelError, KernelResult};
use crate::queue::{BlockingQueue, Closed};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// A unit of work executed on one of the pool's threads.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker threads consuming a shared job queue.
///
/// A job that panics is logged and discarded; the worker carries on with the
/// next one. [`shutdown`](WorkerPool::shutdown) lets already scheduled jobs
/// finish before the threads are joined.
pub struct WorkerPool {
    jobs: Arc<BlockingQueue<Job>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
    size: usize,
}

impl WorkerPool {
    /// Start `workers` threads. Zero means one per available CPU.
    pub fn new(workers: usize) -> KernelResult<Self> {
        let size = if workers == 0 {
            thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            workers
        };

        let jobs: Arc<BlockingQueue<Job>> = Arc::new(BlockingQueue::new());
        let mut handles = Vec::with_capacity(size);
        for i in 0..size {
            let name = format!("fifu-worker-{i}");
            let queue = Arc::clone(&jobs);
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(&queue));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    jobs.stop();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(KernelError::Spawn { name, source });
                }
            }
        }

        debug!(workers = size, "worker pool started");
        Ok(Self {
            jobs,
            workers: Mutex::new(handles),
            running: AtomicBool::new(true),
            size,
        })
    }

    /// Queue a job. Never blocks. Jobs scheduled after shutdown are dropped.
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.running.load(Ordering::Acquire) {
            warn!("worker pool is shut down, dropping job");
            return;
        }
        self.jobs.push(Box::new(job));
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Jobs waiting for a free worker.
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    /// Stop accepting work, drain what was already scheduled and join the
    /// workers. Safe to call more than once and from a worker thread.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.jobs.stop();

        let handles = std::mem::take(&mut *self.workers.lock());
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("worker thread terminated abnormally");
            }
        }
        debug!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(jobs: &BlockingQueue<Job>) {
    loop {
        match jobs.pop() {
            Ok(job) => run_job(job),
            Err(Closed) => {
                while let Some(job) = jobs.try_pop() {
                    run_job(job);
                }
                return;
            }
        }
    }
}

fn run_job(job: Job) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
        error!(panic = %panic_message(&*payload), "job panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn zero_means_available_parallelism() {
        let pool = WorkerPool::new(0).unwrap();
        assert!(pool.size() >= 1);
    }

    #[test]
    fn runs_scheduled_jobs() {
        let pool = WorkerPool::new(4).unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..32 {
            let tx = tx.clone();
            pool.schedule(move || tx.send(i).unwrap());
        }
        let mut seen: Vec<i32> = (0..32)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort();
        assert_eq!(seen, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(1).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.schedule(|| panic!("boom"));
        pool.schedule(move || tx.send(()).unwrap());
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn shutdown_finishes_scheduled_jobs() {
        let pool = WorkerPool::new(2).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let done = Arc::clone(&done);
            pool.schedule(move || {
                thread::sleep(Duration::from_millis(2));
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert!(!pool.is_running());
    }

    #[test]
    fn schedule_after_shutdown_is_dropped() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        pool.shutdown();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        pool.schedule(move || flag.store(true, Ordering::SeqCst));
        thread::sleep(Duration::from_millis(20));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn shutdown_from_worker_thread_does_not_deadlock() {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&pool);
        pool.schedule(move || {
            inner.shutdown();
            tx.send(()).unwrap();
        });
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
