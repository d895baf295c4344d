//! The serial executor.
//!
//! One named worker thread drains a bounded queue of jobs, one at a time, in
//! submission order. It is the only place engine commands are issued and the
//! only place listener callbacks run. The same thread hosts a current-thread
//! tokio runtime so metadata-client requests can be awaited without a second
//! scheduler; their results re-enter the queue as ordinary jobs.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::runtime::{Builder, Handle as RuntimeHandle};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::errors::{WalletError, WalletResult};

/// Default bound on queued jobs.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Cheaply cloneable handle to one serial worker.
#[derive(Clone)]
pub struct SerialExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    name: String,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    runtime: RuntimeHandle,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    /// Queued jobs plus in-flight I/O tasks
    pending: Mutex<usize>,
    idle: Condvar,
}

impl SerialExecutor {
    /// Start a worker named `name` whose queue holds at most `capacity` jobs.
    pub fn new(name: &str, capacity: usize) -> WalletResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| WalletError::Unknown(format!("Failed to build executor runtime: {}", e)))?;
        let runtime_handle = runtime.handle().clone();
        let (sender, mut receiver) = mpsc::channel::<Job>(capacity.max(1));

        let inner = Arc::new_cyclic(|weak: &std::sync::Weak<ExecutorInner>| {
            let weak = weak.clone();
            let worker = thread::Builder::new()
                .name(name.to_string())
                .spawn(move || {
                    runtime.block_on(async move {
                        while let Some(job) = receiver.recv().await {
                            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(job)) {
                                log::error!("Executor job panicked: {}", panic_message(&*panic));
                            }
                            if let Some(inner) = weak.upgrade() {
                                inner.complete_one();
                            }
                        }
                    });
                    log::debug!("Executor worker exiting");
                });
            let (worker, worker_id) = match worker {
                Ok(handle) => {
                    let id = handle.thread().id();
                    (Some(handle), id)
                }
                // Leaves the executor permanently stopped; see below.
                Err(e) => {
                    log::error!("Failed to spawn executor thread: {}", e);
                    (None, thread::current().id())
                }
            };
            ExecutorInner {
                name: name.to_string(),
                sender: Mutex::new(worker.as_ref().map(|_| sender)),
                runtime: runtime_handle,
                worker: Mutex::new(worker),
                worker_id,
                pending: Mutex::new(0),
                idle: Condvar::new(),
            }
        });

        if inner.worker.lock().is_none() {
            return Err(WalletError::ExecutorStopped);
        }
        log::debug!("Started serial executor '{}' (capacity {})", name, capacity);
        Ok(SerialExecutor { inner })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queue a job. Never blocks; fails when the queue is full or stopped.
    pub fn execute<F>(&self, job: F) -> WalletResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.inner.sender.lock();
        let sender = sender.as_ref().ok_or(WalletError::ExecutorStopped)?;

        *self.inner.pending.lock() += 1;
        match sender.try_send(Box::new(job)) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.inner.complete_one();
                match err {
                    TrySendError::Full(_) => {
                        log::warn!("Executor '{}' queue is full", self.inner.name);
                        Err(WalletError::ExecutorBusy)
                    }
                    TrySendError::Closed(_) => Err(WalletError::ExecutorStopped),
                }
            }
        }
    }

    /// Run an I/O future on the worker's runtime. It makes progress only
    /// while the worker is between jobs.
    pub fn spawn_io<F>(&self, future: F) -> WalletResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.inner.sender.lock().is_none() {
            return Err(WalletError::ExecutorStopped);
        }

        *self.inner.pending.lock() += 1;
        let inner = Arc::downgrade(&self.inner);
        self.inner.runtime.spawn(async move {
            future.await;
            if let Some(inner) = inner.upgrade() {
                inner.complete_one();
            }
        });
        Ok(())
    }

    /// True when called from the worker thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.worker_id
    }

    /// Number of queued jobs plus in-flight I/O tasks.
    pub fn pending(&self) -> usize {
        *self.inner.pending.lock()
    }

    /// Block until every queued job and I/O task has finished, including work
    /// they queue in turn.
    pub fn wait_idle(&self, timeout: Duration) -> WalletResult<()> {
        if self.is_current() {
            return Err(WalletError::Unknown(
                "wait_idle cannot be called from the executor thread".to_string(),
            ));
        }

        let deadline = Instant::now() + timeout;
        let mut pending = self.inner.pending.lock();
        while *pending > 0 {
            if self
                .inner
                .idle
                .wait_until(&mut pending, deadline)
                .timed_out()
            {
                return Err(WalletError::Timeout(format!(
                    "executor '{}' still has {} pending jobs",
                    self.inner.name, *pending
                )));
            }
        }
        Ok(())
    }

    /// Stop accepting work, let the worker drain what is queued, and join it.
    /// Idempotent.
    pub fn shutdown(&self) {
        let sender = self.inner.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let worker = self.inner.worker.lock().take();
        if let Some(worker) = worker {
            if self.is_current() {
                // The worker exits on its own once this job returns
                return;
            }
            if worker.join().is_err() {
                log::error!("Executor '{}' worker panicked", self.inner.name);
            }
        }

        // I/O tasks still parked on the runtime were dropped with it
        *self.inner.pending.lock() = 0;
        self.inner.idle.notify_all();
        log::debug!("Stopped serial executor '{}'", self.inner.name);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.sender.lock().is_none()
    }
}

impl ExecutorInner {
    fn complete_one(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

impl Drop for ExecutorInner {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop; the thread is detached.
        self.sender.get_mut().take();
    }
}

impl std::fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("name", &self.inner.name)
            .field("pending", &self.pending())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
