//! Fixed-size worker pool with future-style join handles.
//!
//! One process-wide pool serves the root-level helper searches. Workers get
//! large stacks because a search recursion frame carries move buffers.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use once_cell::sync::Lazy;

/// Stack size for pool workers; deep search recursion needs room.
const WORKER_STACK_SIZE: usize = 32 * 1024 * 1024;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct ThreadPool {
    sender: Sender<Job>,
    _workers: Vec<JoinHandle<()>>,
}

/// Handle to a task's result; `join` blocks until the task ran.
pub struct TaskHandle<T> {
    receiver: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task. `None` only if the worker panicked.
    pub fn join(self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

impl ThreadPool {
    #[must_use]
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size.max(1));
        for id in 0..size.max(1) {
            let rx = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("pool-{id}"))
                .stack_size(WORKER_STACK_SIZE)
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })
                .expect("failed to spawn pool worker");
            workers.push(handle);
        }
        ThreadPool {
            sender,
            _workers: workers,
        }
    }

    /// Queue `f`; its return value arrives through the handle.
    pub fn execute<T, F>(&self, f: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let job: Job = Box::new(move || {
            let result = f();
            let _ = tx.send(result);
        });
        self.sender
            .send(job)
            .expect("thread pool queue disconnected");
        TaskHandle { receiver: rx }
    }
}

/// The shared process-wide pool, sized to the hardware thread count.
pub fn global() -> &'static ThreadPool {
    static POOL: Lazy<ThreadPool> = Lazy::new(|| {
        let size = thread::available_parallelism().map_or(4, |n| n.get());
        ThreadPool::new(size)
    });
    &POOL
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn tasks_run_and_return() {
        let pool = ThreadPool::new(2);
        let handle = pool.execute(|| 40 + 2);
        assert_eq!(handle.join(), Some(42));
    }

    #[test]
    fn many_tasks_all_complete() {
        let pool = ThreadPool::new(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let c = Arc::clone(&counter);
                pool.execute(move || {
                    c.fetch_add(1, Ordering::Relaxed);
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().is_some());
        }
        assert_eq!(counter.load(Ordering::Relaxed), 32);
    }
}
