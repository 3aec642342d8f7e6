use rayon::prelude::*;
use rayon::ThreadPool;

use super::error::BooleanError;

/// Bounded worker pool for the parallel stages. Each call fans out over a
/// slice and joins before returning, with results in input order.
pub struct TaskScheduler {
    pool: Option<ThreadPool>,
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("threads", &self.pool.as_ref().map(|p| p.current_num_threads()))
            .finish()
    }
}

impl TaskScheduler {
    pub fn new(parallel: bool, max_threads: Option<usize>) -> Result<Self, BooleanError> {
        if !parallel {
            return Ok(Self::serial());
        }
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("boolean-worker-{i}"));
        if let Some(n) = max_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build().map_err(|e| BooleanError::Scheduler(e.to_string()))?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn serial() -> Self {
        Self { pool: None }
    }

    pub fn map_ordered<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(|| items.par_iter().map(&f).collect()),
            None => items.iter().map(f).collect(),
        }
    }

    /// Like [`TaskScheduler::map_ordered`], stopping at an error. Which error
    /// is reported when several tasks fail is unspecified.
    pub fn try_map_ordered<T, R, E, F>(&self, items: &[T], f: F) -> Result<Vec<R>, E>
    where
        T: Sync,
        R: Send,
        E: Send,
        F: Fn(&T) -> Result<R, E> + Sync + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(|| items.par_iter().map(&f).collect()),
            None => items.iter().map(f).collect(),
        }
    }
}
