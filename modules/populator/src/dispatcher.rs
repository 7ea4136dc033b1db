//! Bucketed concurrent dispatcher
//!
//! Work items are dealt round-robin into buckets, one worker per bucket runs
//! on the shared pool, and a [`Synchronizer`] joins the results into a single
//! handler call.

use crate::synchronizer::Synchronizer;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::debug;

/// Number of worker threads when none is configured (matches CPU cores)
pub fn default_thread_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Deal `items` into `buckets` partitions; item `i` goes to bucket `i % buckets`.
///
/// Every item lands in exactly one bucket. Zero buckets yields no partitions
/// and drops the items.
pub fn partition<T>(items: impl IntoIterator<Item = T>, buckets: usize) -> Vec<Vec<T>> {
    let mut partitions: Vec<Vec<T>> = (0..buckets).map(|_| Vec::new()).collect();
    if buckets == 0 {
        return partitions;
    }

    for (index, item) in items.into_iter().enumerate() {
        partitions[index % buckets].push(item);
    }

    partitions
}

/// Fan-out/fan-in over an injected thread pool
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<ThreadPool>,
}

impl Dispatcher {
    /// Dispatch onto an existing pool
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self { pool }
    }

    /// Build a dedicated pool of named threads; zero means one per core
    pub fn with_threads(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let threads = if threads == 0 {
            default_thread_count()
        } else {
            threads
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("populate-{}", i))
            .build()?;

        Ok(Self::new(Arc::new(pool)))
    }

    /// Number of workers available
    pub fn size(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Bucket count for `items` work items: `min(size, items)`, never zero
    /// when there is work.
    pub fn buckets(&self, items: usize) -> usize {
        self.size().max(1).min(items)
    }

    /// Run `work` once per partition on the pool and report through `handler`.
    ///
    /// `work` receives the bucket index and the partition it exclusively owns.
    /// The handler fires exactly once, with the first failure or success,
    /// after every worker has finished; this call returns after that. With
    /// no partitions the handler fires immediately and nothing is spawned.
    pub fn concurrent<T, E, W, H>(&self, name: &str, partitions: Vec<T>, work: W, handler: H)
    where
        T: Send,
        E: Send,
        W: Fn(usize, T) -> Result<(), E> + Sync,
        H: FnOnce(Result<(), E>) + Send,
    {
        if partitions.is_empty() {
            handler(Ok(()));
            return;
        }

        debug!(dispatch = name, buckets = partitions.len(), "Dispatching");
        let synchronizer = Synchronizer::new(handler, partitions.len(), name);
        let synchronizer = &synchronizer;
        let work = &work;

        self.pool.scope(move |scope| {
            for (bucket, partition) in partitions.into_iter().enumerate() {
                scope.spawn(move |_| synchronizer.signal(work(bucket, partition)));
            }
        });
    }
}
