//! Pluggable map/reduce executors.
//!
//! The grid only needs "map each partition of a slice to a partial result,
//! then combine partials". `combine` must be associative and commutative;
//! executors are free to split and order partitions however they like.

use crate::config::ExecutionConfig;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::{error::Error, fmt};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// A map or combine call panicked; the payload message is kept.
    WorkerPanicked(String),
    PoolBuild(String),
    InvalidConfig(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::WorkerPanicked(msg) => write!(f, "worker panicked: {msg}"),
            ExecutionError::PoolBuild(msg) => write!(f, "failed to build thread pool: {msg}"),
            ExecutionError::InvalidConfig(msg) => write!(f, "invalid execution config: {msg}"),
        }
    }
}

impl Error for ExecutionError {}

pub trait ExecutionContext: Send + Sync {
    fn name(&self) -> &'static str;

    /// Upper bound on elements handed to a single `map` call.
    fn partition_size(&self) -> usize;

    /// Map every partition of `elements` and fold the partials with `combine`.
    /// Returns `identity()` for an empty slice.
    fn map_reduce<T, A, I, M, R>(
        &self,
        elements: &[T],
        identity: I,
        map: M,
        combine: R,
    ) -> Result<A, ExecutionError>
    where
        T: Sync,
        A: Send,
        I: Fn() -> A + Sync + Send,
        M: Fn(&[T]) -> A + Sync + Send,
        R: Fn(A, A) -> A + Sync + Send;
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Single-threaded fallback. Still partitions, so partial sizes match the
/// parallel executors.
#[derive(Clone, Debug)]
pub struct SerialContext {
    partition_size: usize,
}

impl SerialContext {
    pub fn new(partition_size: usize) -> Self {
        Self {
            partition_size: partition_size.max(1),
        }
    }
}

impl Default for SerialContext {
    fn default() -> Self {
        Self::new(ExecutionConfig::default().partition_size)
    }
}

impl ExecutionContext for SerialContext {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn partition_size(&self) -> usize {
        self.partition_size
    }

    fn map_reduce<T, A, I, M, R>(
        &self,
        elements: &[T],
        identity: I,
        map: M,
        combine: R,
    ) -> Result<A, ExecutionError>
    where
        T: Sync,
        A: Send,
        I: Fn() -> A + Sync + Send,
        M: Fn(&[T]) -> A + Sync + Send,
        R: Fn(A, A) -> A + Sync + Send,
    {
        panic::catch_unwind(AssertUnwindSafe(|| {
            elements
                .chunks(self.partition_size)
                .map(&map)
                .fold(identity(), &combine)
        }))
        .map_err(|payload| ExecutionError::WorkerPanicked(panic_message(payload)))
    }
}

/// Rayon executor, on the global pool or on a dedicated one.
#[derive(Clone, Debug)]
pub struct RayonContext {
    pool: Option<Arc<rayon::ThreadPool>>,
    partition_size: usize,
}

impl RayonContext {
    /// Run on rayon's global pool.
    pub fn global() -> Self {
        Self {
            pool: None,
            partition_size: ExecutionConfig::default().partition_size,
        }
    }

    pub fn with_partition_size(mut self, partition_size: usize) -> Self {
        self.partition_size = partition_size.max(1);
        self
    }

    /// Build a dedicated pool when `num_threads` is set; otherwise use the global one.
    pub fn from_config(config: &ExecutionConfig) -> Result<Self, ExecutionError> {
        config.validate()?;
        let pool = match config.num_threads {
            Some(num_threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .thread_name(|idx| format!("grid-deposit-{idx}"))
                    .build()
                    .map_err(|e| ExecutionError::PoolBuild(e.to_string()))?;
                info!(num_threads, "built dedicated deposition pool");
                Some(Arc::new(pool))
            }
            None => None,
        };
        Ok(Self {
            pool,
            partition_size: config.partition_size,
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool
            .as_ref()
            .map(|pool| pool.current_num_threads())
            .unwrap_or_else(rayon::current_num_threads)
    }
}

impl Default for RayonContext {
    fn default() -> Self {
        Self::global()
    }
}

impl ExecutionContext for RayonContext {
    fn name(&self) -> &'static str {
        "rayon"
    }

    fn partition_size(&self) -> usize {
        self.partition_size
    }

    fn map_reduce<T, A, I, M, R>(
        &self,
        elements: &[T],
        identity: I,
        map: M,
        combine: R,
    ) -> Result<A, ExecutionError>
    where
        T: Sync,
        A: Send,
        I: Fn() -> A + Sync + Send,
        M: Fn(&[T]) -> A + Sync + Send,
        R: Fn(A, A) -> A + Sync + Send,
    {
        let run = || {
            elements
                .par_chunks(self.partition_size)
                .map(|chunk| map(chunk))
                .reduce(&identity, &combine)
        };
        // Rayon re-raises worker panics on the calling thread.
        let outcome = match &self.pool {
            Some(pool) => panic::catch_unwind(AssertUnwindSafe(|| pool.install(run))),
            None => panic::catch_unwind(AssertUnwindSafe(run)),
        };
        outcome.map_err(|payload| ExecutionError::WorkerPanicked(panic_message(payload)))
    }
}
