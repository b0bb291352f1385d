//! Shared worker pool
//!
//! Asynchronous channel delivery and replication sends run here so publishers
//! never wait on consumers or the network. Backed by a tokio multi-thread
//! runtime, either owned by the pool or borrowed through a handle.

use std::{future::Future, sync::Mutex};

use log::{debug, info};
use tokio::runtime::{Builder, Handle, Runtime};

use super::error::{ErrorContext, RuntimeResult};

pub struct WorkerPool {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
}

impl WorkerPool {
    /// Create a pool that owns a runtime with `workers` threads
    pub fn new(workers: usize) -> RuntimeResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .thread_name("runtime-worker")
            .enable_all()
            .build()
            .with_context("Failed to build worker pool")?;
        info!("Worker pool started with {} threads", workers.max(1));
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
        })
    }

    /// Create a pool on top of an existing runtime
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            runtime: Mutex::new(None),
        }
    }

    /// Run a blocking task on the pool
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        drop(self.handle.spawn_blocking(task));
    }

    /// Run a future on the pool
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(self.handle.spawn(future));
    }

    /// Stop an owned runtime without waiting for queued work
    pub fn shutdown(&self) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            debug!("Shutting down worker pool");
            runtime.shutdown_background();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::mpsc, time::Duration};

    #[test]
    fn test_owned_pool_executes_tasks() {
        let pool = WorkerPool::new(2).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.execute(move || tx.send(7).unwrap());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
        pool.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_borrowed_pool_spawns_futures() {
        let pool = WorkerPool::from_handle(Handle::current());
        let (tx, rx) = tokio::sync::oneshot::channel();
        pool.spawn(async move {
            let _ = tx.send("done");
        });
        assert_eq!(rx.await.unwrap(), "done");
    }
}
