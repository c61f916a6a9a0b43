// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed-size connection pool.
//!
//! A counting semaphore sized once at startup. Every backend request holds a
//! permit for its whole duration; when all permits are out, callers queue in
//! FIFO order until one is released.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use vtb_error::{BridgeError, ErrorKind};

/// Failure to obtain a pool permit.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The pool was closed during shutdown.
    #[error("connection pool is closed")]
    Closed,
    /// No permit is free right now (only from [`ConnectionPool::try_acquire`]).
    #[error("connection pool exhausted")]
    Exhausted,
}

impl From<PoolError> for BridgeError {
    fn from(err: PoolError) -> Self {
        BridgeError::new(ErrorKind::BackendUnavailable, err.to_string()).with_source(err)
    }
}

/// A bounded set of backend connection slots.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl ConnectionPool {
    /// A pool with `size` slots. Zero is treated as one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)
    }

    /// Take a free slot without waiting.
    pub fn try_acquire(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::Closed => PoolError::Closed,
                TryAcquireError::NoPermits => PoolError::Exhausted,
            })
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Configured number of slots.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Wake every waiter with [`PoolError::Closed`].
    pub fn close(&self) {
        self.permits.close();
    }
}
