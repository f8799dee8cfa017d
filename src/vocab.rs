//! Top-K token selection and the word-id vocabulary.

use crate::ids::IdAssignment;
use crate::merge::FreqMap;
use anyhow::Result;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

pub const UNK: &str = "<unk>";
pub const SENT_START: &str = "<sent_start>";
pub const SENT_END: &str = "<sent_end>";
pub const RESERVED_TOKENS: [&str; 3] = [UNK, SENT_START, SENT_END];

/// Word ids start at 1; 0 is never assigned.
pub const FIRST_WORD_ID: u32 = 1;

/// All entries by count descending. Equal counts are ordered by token, ascending
/// byte order, so the ranking is a pure function of the mapping.
pub fn rank_by_count(counts: &FreqMap) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    ranked.sort_unstable_by(|a, b| (Reverse(a.1), &a.0).cmp(&(Reverse(b.1), &b.0)));
    ranked
}

/// The first `limit` entries of [`rank_by_count`].
pub fn top_k(counts: &FreqMap, limit: usize) -> Vec<(String, u64)> {
    let mut ranked = rank_by_count(counts);
    ranked.truncate(limit);
    ranked
}

#[derive(Clone, Debug)]
pub struct Vocabulary {
    ids: IdAssignment,
}

impl Vocabulary {
    /// Keep the `vocab_size - 3` most frequent tokens, add the reserved tokens and
    /// number the union lexicographically from 1.
    ///
    /// Also returns the report rows: the top `vocab_size` `(token, count)` entries.
    pub fn from_counts(counts: &FreqMap, vocab_size: usize) -> Result<(Self, Vec<(String, u64)>)> {
        let limit = vocab_size.saturating_sub(RESERVED_TOKENS.len());
        let ranked = rank_by_count(counts);
        let report: Vec<(String, u64)> = ranked.iter().take(vocab_size).cloned().collect();

        // reserved tokens never take a ranked slot
        let mut tokens: BTreeSet<String> = ranked
            .into_iter()
            .filter(|(t, _)| !RESERVED_TOKENS.contains(&t.as_str()))
            .take(limit)
            .map(|(t, _)| t)
            .collect();
        tokens.extend(RESERVED_TOKENS.iter().map(|t| t.to_string()));

        let ids = IdAssignment::new(tokens, FIRST_WORD_ID)?;
        tracing::info!(
            distinct = counts.len(),
            kept = ids.len(),
            "vocabulary pruned to top {limit} tokens + reserved"
        );
        Ok((Self { ids }, report))
    }

    pub fn from_map(map: &BTreeMap<String, u32>) -> Result<Self> {
        let ids = IdAssignment::from_map(map, FIRST_WORD_ID)?;
        for t in RESERVED_TOKENS {
            if ids.id(t).is_none() {
                anyhow::bail!("vocabulary is missing reserved token {t}");
            }
        }
        Ok(Self { ids })
    }

    pub fn to_map(&self) -> BTreeMap<String, u32> {
        self.ids.to_map()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, token: &str) -> Option<u32> {
        self.ids.id(token)
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.ids.name(id)
    }

    pub fn unk_id(&self) -> u32 {
        // present by construction
        self.ids.id(UNK).unwrap_or(0)
    }

    /// Token ids, with out-of-vocabulary tokens mapped to `<unk>`.
    pub fn ids_for<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<u32> {
        let unk = self.unk_id();
        tokens.iter().map(|t| self.ids.id(t.as_ref()).unwrap_or(unk)).collect()
    }
}
