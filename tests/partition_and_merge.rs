use rprep::{combine_counts, merge_counts, new_freq_map, pair_key, partition, shard_len, split_pair_key, FreqMap, WorkerPool};
use std::sync::atomic::{AtomicUsize, Ordering};

fn freq(pairs: &[(&str, u64)]) -> FreqMap {
    let mut m = new_freq_map();
    for (k, v) in pairs {
        m.insert(k.to_string(), *v);
    }
    m
}

/// Concatenating the shards gives back the input, there are exactly `W` of them and
/// none is larger than `ceil(N/W)`.
#[test]
fn partition_is_complete_and_bounded() {
    for n in 0..30usize {
        let items: Vec<usize> = (0..n).collect();
        for w in 1..8usize {
            let shards = partition(&items, w);
            assert_eq!(shards.len(), w, "n={n} w={w}");
            assert!(shards.iter().all(|s| s.len() <= shard_len(n, w)));
            let joined: Vec<usize> = shards.concat();
            assert_eq!(joined, items, "n={n} w={w}");
        }
    }
}

#[test]
fn partition_leaves_trailing_shards_empty() {
    let shards = partition(&[1, 2, 3, 4, 5], 4);
    let sizes: Vec<usize> = shards.iter().map(|s| s.len()).collect();
    assert_eq!(sizes, vec![2, 2, 1, 0]);

    let none: Vec<u8> = Vec::new();
    assert!(partition(&none, 3).iter().all(|s| s.is_empty()));
}

/// Empty shards never reach a worker; results come back in shard order.
#[test]
fn fan_out_skips_empty_shards_and_keeps_order() {
    let pool = WorkerPool::new(5).unwrap();
    let calls = AtomicUsize::new(0);
    let out = pool
        .fan_out("test", &["a", "b"], false, |shard| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok((shard.index, shard.items.to_vec()))
        })
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(out, vec![(0, vec!["a"]), (1, vec!["b"])]);
}

/// A failing shard does not stop its siblings; the first failure by shard index is reported.
#[test]
fn fan_out_runs_every_shard_and_reports_first_failure() {
    let pool = WorkerPool::new(4).unwrap();
    let done = AtomicUsize::new(0);
    let err = pool
        .fan_out("test", &[0, 1, 2, 3], false, |shard| {
            done.fetch_add(1, Ordering::SeqCst);
            if shard.index % 2 == 1 {
                anyhow::bail!("boom in {}", shard.index);
            }
            Ok(())
        })
        .unwrap_err();
    assert_eq!(done.load(Ordering::SeqCst), 4);
    let msg = format!("{err:#}");
    assert!(msg.contains("shard 1 failed"), "{msg}");
    assert!(msg.contains("boom in 1"), "{msg}");
}

#[test]
fn merge_is_commutative_and_associative() {
    let a = freq(&[("the", 5), ("cat", 1)]);
    let b = freq(&[("the", 3), ("dog", 2)]);
    let c = freq(&[("cat", 4)]);

    let abc = combine_counts([a.clone(), b.clone(), c.clone()]);
    let cab = combine_counts([c.clone(), a.clone(), b.clone()]);
    let bca = combine_counts([b.clone(), c.clone(), a.clone()]);
    assert_eq!(abc, cab);
    assert_eq!(abc, bca);

    // (a + b) + c == a + (b + c)
    let mut left = a.clone();
    merge_counts(&mut left, b.clone());
    merge_counts(&mut left, c.clone());
    let mut bc = b;
    merge_counts(&mut bc, c);
    let mut right = a;
    merge_counts(&mut right, bc);
    assert_eq!(left, right);

    assert_eq!(abc.get("the"), Some(&8));
    assert_eq!(abc.get("cat"), Some(&5));
    assert_eq!(abc.get("dog"), Some(&2));
}

#[test]
fn pair_keys_split_back() {
    let k = pair_key("alice", "rust");
    assert_eq!(k, "alice rust");
    assert_eq!(split_pair_key(&k), Some(("alice", "rust")));
    assert_eq!(split_pair_key("nospace"), None);
    assert_eq!(split_pair_key("a b c"), None);
}
