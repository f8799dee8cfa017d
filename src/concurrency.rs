//! Fan-out/fan-in over a bounded worker pool: one task per non-empty shard, a join
//! barrier, then the results in shard order for a sequential reduce.

use crate::partition::partition;
use crate::progress::ProgressScope;
use anyhow::{Context, Result};
use rayon::prelude::*;

/// One worker's slice of the input list.
pub struct Shard<'a, T> {
    pub index: usize,
    pub items: &'a [T],
    progress: Option<&'a ProgressScope>,
}

impl<'a, T> Shard<'a, T> {
    /// Mark one item of this shard as done.
    pub fn tick(&self) {
        if let Some(pb) = self.progress {
            pb.inc_items(1);
        }
    }
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("rprep-worker-{i}"))
            .build()
            .context("build worker pool")?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Partition `items` into `workers` shards and run `task` on every non-empty one.
    ///
    /// Workers share nothing; a failing shard does not stop its siblings. After all
    /// shards have finished, every failure is logged and the first one (by shard index)
    /// is returned. On success the results come back in shard order, so a sequential
    /// reduce over them is independent of completion order.
    pub fn fan_out<T, R, F>(&self, label: &str, items: &[T], progress: bool, task: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&Shard<'_, T>) -> Result<R> + Sync,
    {
        let shards: Vec<(usize, &[T])> = partition(items, self.workers)
            .into_iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .collect();
        tracing::info!(stage = label, items = items.len(), shards = shards.len(), "fan-out");

        let pb = progress.then(|| ProgressScope::count(label, items.len() as u64));
        let results: Vec<(usize, Result<R>)> = self.pool.install(|| {
            shards
                .par_iter()
                .map(|&(index, slice)| {
                    let shard = Shard { index, items: slice, progress: pb.as_ref() };
                    (index, task(&shard))
                })
                .collect()
        });

        let mut out = Vec::with_capacity(results.len());
        let mut first_err: Option<(usize, anyhow::Error)> = None;
        let mut failed = 0usize;
        for (index, res) in results {
            match res {
                Ok(r) => out.push(r),
                Err(e) => {
                    failed += 1;
                    tracing::error!(stage = label, shard = index, "shard failed: {e:#}");
                    if first_err.is_none() {
                        first_err = Some((index, e));
                    }
                }
            }
        }

        if let Some(pb) = pb {
            pb.finish(if failed == 0 { format!("{label}: done") } else { format!("{label}: {failed} shard(s) failed") });
        }
        match first_err {
            Some((index, e)) => Err(e.context(format!("{label}: shard {index} failed ({failed} failed in total)"))),
            None => Ok(out),
        }
    }
}
