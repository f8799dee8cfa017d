//! Contiguous sharding of an ordered input list across workers.

/// Split `items` into exactly `workers` contiguous shards of `ceil(N / W)` items.
/// Trailing shards may be short or empty; concatenating the shards in order gives
/// back `items`.
///
/// ```
/// let shards = rprep::partition(&[1, 2, 3, 4, 5], 3);
/// assert_eq!(shards, vec![&[1, 2][..], &[3, 4][..], &[5][..]]);
/// ```
pub fn partition<T>(items: &[T], workers: usize) -> Vec<&[T]> {
    let workers = workers.max(1);
    let per_shard = items.len().div_ceil(workers);
    (0..workers)
        .map(|i| {
            let lo = (i * per_shard).min(items.len());
            let hi = ((i + 1) * per_shard).min(items.len());
            &items[lo..hi]
        })
        .collect()
}

/// Shard size used by [`partition`].
pub fn shard_len(n: usize, workers: usize) -> usize {
    n.div_ceil(workers.max(1))
}
