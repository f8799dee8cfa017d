//! Frequency mappings and the reducer that sums them.

use ahash::RandomState;
use std::collections::HashMap;

/// key -> count accumulator (tokens, user names, `"user category"` pairs).
pub type FreqMap = HashMap<String, u64, RandomState>;

pub fn new_freq_map() -> FreqMap {
    FreqMap::default()
}

#[inline]
pub fn bump(map: &mut FreqMap, key: &str, by: u64) {
    if let Some(v) = map.get_mut(key) {
        *v += by;
    } else {
        map.insert(key.to_string(), by);
    }
}

/// Add every count of `part` into `total`.
pub fn merge_counts(total: &mut FreqMap, part: FreqMap) {
    if total.is_empty() {
        *total = part;
        return;
    }
    for (k, v) in part {
        *total.entry(k).or_insert(0) += v;
    }
}

/// Sum a sequence of mappings. Absent keys count as zero, so the result does not
/// depend on the order of `parts`.
pub fn combine_counts<I>(parts: I) -> FreqMap
where
    I: IntoIterator<Item = FreqMap>,
{
    let mut total = new_freq_map();
    for part in parts {
        merge_counts(&mut total, part);
    }
    total
}

/// Composite key of a user-category pair.
pub fn pair_key(user: &str, category: &str) -> String {
    let mut k = String::with_capacity(user.len() + category.len() + 1);
    k.push_str(user);
    k.push(' ');
    k.push_str(category);
    k
}

/// Split a composite `"user category"` key. Reddit names contain no spaces.
pub fn split_pair_key(key: &str) -> Option<(&str, &str)> {
    let (user, category) = key.split_once(' ')?;
    if user.is_empty() || category.is_empty() || category.contains(' ') {
        return None;
    }
    Some((user, category))
}
