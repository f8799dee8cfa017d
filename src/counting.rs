//! Worker counters: per-shard scans that parse records, apply the validity predicate
//! and accumulate local count structures, plus the `Aggregator` trait they share.

use crate::concurrency::Shard;
use crate::config::MalformedPolicy;
use crate::entity::EntitySet;
use crate::error::PrepError;
use crate::ids::IdAssignment;
use crate::jsonl::{for_each_line, parse_record, PostRecord};
use crate::merge::{bump, merge_counts, new_freq_map, pair_key, FreqMap};
use crate::paths::InputFile;
use crate::sparse::TripletAccumulator;
use crate::text::{one_line, Tokenizer};
use crate::validity::{EntryValidator, FirstLevelOnly};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Local state of one worker. `ingest` sees each accepted record once; `merge` folds
/// another worker's state of the same kind into this one. Counts must merge
/// commutatively; collected lines keep shard order because merges run in shard order.
pub trait Aggregator: Send {
    fn ingest(&mut self, record: &PostRecord) -> Result<()>;
    fn merge(&mut self, other: Self)
    where
        Self: Sized;
}

/// What every scan needs besides the aggregator.
#[derive(Clone, Copy)]
pub struct ScanContext<'a> {
    pub validator: &'a dyn EntryValidator,
    pub first_level_only: bool,
    pub malformed: MalformedPolicy,
    pub read_buffer_bytes: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub lines: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub skipped_malformed: u64,
}

impl ScanStats {
    pub fn merge(&mut self, other: ScanStats) {
        self.lines += other.lines;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.skipped_malformed += other.skipped_malformed;
    }
}

impl ScanContext<'_> {
    fn admit(&self, rec: &PostRecord) -> Result<bool> {
        if self.first_level_only && !FirstLevelOnly.is_valid(rec)? {
            return Ok(false);
        }
        self.validator.is_valid(rec)
    }

    /// Apply the malformed policy to a line-level failure.
    fn on_bad_line(&self, path: &Path, line_no: u64, reason: anyhow::Error, raw: &str, stats: &mut ScanStats) -> Result<()> {
        match self.malformed {
            MalformedPolicy::FailShard => Err(PrepError::malformed(path, line_no, format!("{reason:#}"), raw).into()),
            MalformedPolicy::SkipRecord => {
                tracing::warn!(path = %path.display(), line = line_no, "skipping record: {reason:#}");
                stats.skipped_malformed += 1;
                Ok(())
            }
        }
    }
}

/// Stream one file into `agg`.
pub fn scan_file<A: Aggregator>(path: &Path, ctx: &ScanContext<'_>, agg: &mut A) -> Result<ScanStats> {
    let mut stats = ScanStats::default();
    for_each_line(path, ctx.read_buffer_bytes, |line_no, line| {
        stats.lines += 1;
        let rec = match parse_record(line) {
            Ok(rec) => rec,
            Err(e) => return ctx.on_bad_line(path, line_no, e, line, &mut stats),
        };
        match ctx.admit(&rec) {
            Ok(true) => {}
            Ok(false) => {
                stats.rejected += 1;
                return Ok(());
            }
            Err(e) => return ctx.on_bad_line(path, line_no, e.context("validity predicate failed"), line, &mut stats),
        }
        stats.accepted += 1;
        agg.ingest(&rec)
    })?;
    tracing::debug!(
        path = %path.display(),
        lines = stats.lines,
        accepted = stats.accepted,
        rejected = stats.rejected,
        skipped = stats.skipped_malformed,
        "scanned"
    );
    Ok(stats)
}

/// Scan every file of a shard into one fresh aggregator.
pub fn scan_shard<A: Aggregator>(
    shard: &Shard<'_, InputFile>,
    ctx: &ScanContext<'_>,
    make: impl Fn() -> A,
) -> Result<(A, ScanStats)> {
    let mut agg = make();
    let mut stats = ScanStats::default();
    for input in shard.items {
        stats.merge(scan_file(&input.path, ctx, &mut agg)?);
        shard.tick();
    }
    Ok((agg, stats))
}

/// Fold per-shard results, in the order given, into one.
pub fn reduce<A: Aggregator>(parts: Vec<(A, ScanStats)>, empty: A) -> (A, ScanStats) {
    let mut total = empty;
    let mut stats = ScanStats::default();
    for (part, s) in parts {
        total.merge(part);
        stats.merge(s);
    }
    (total, stats)
}

/// Optional user and category restriction. Records outside either set are ignored.
#[derive(Clone, Default)]
pub struct Scope {
    pub users: Option<Arc<EntitySet>>,
    pub categories: Option<Arc<EntitySet>>,
}

impl Scope {
    pub fn new(users: Option<Arc<EntitySet>>, categories: Option<Arc<EntitySet>>) -> Self {
        Self { users, categories }
    }

    /// `(author, subreddit)` when the record is in scope.
    pub fn admit<'r>(&self, rec: &'r PostRecord) -> Option<(&'r str, &'r str)> {
        let (user, category) = (rec.author()?, rec.subreddit()?);
        if self.users.as_ref().is_some_and(|s| !s.contains(user)) {
            return None;
        }
        if self.categories.as_ref().is_some_and(|s| !s.contains(category)) {
            return None;
        }
        Some((user, category))
    }
}

/// Token frequencies over the text of in-scope records.
pub struct TokenCounter {
    tokenizer: Arc<dyn Tokenizer>,
    scope: Scope,
    pub counts: FreqMap,
}

impl TokenCounter {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, scope: Scope) -> Self {
        Self { tokenizer, scope, counts: new_freq_map() }
    }
}

impl Aggregator for TokenCounter {
    fn ingest(&mut self, record: &PostRecord) -> Result<()> {
        if self.scope.admit(record).is_none() {
            return Ok(());
        }
        for token in self.tokenizer.tokenize(&record.text()) {
            bump(&mut self.counts, &token, 1);
        }
        Ok(())
    }

    fn merge(&mut self, other: Self) {
        merge_counts(&mut self.counts, other.counts);
    }
}

/// Per-user post counts and per `"user category"` post counts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub user_posts: FreqMap,
    pub user_category: FreqMap,
}

impl ActivityCounts {
    pub fn posts_of(&self, user: &str) -> u64 {
        self.user_posts.get(user).copied().unwrap_or(0)
    }
}

impl Aggregator for ActivityCounts {
    fn ingest(&mut self, record: &PostRecord) -> Result<()> {
        if let (Some(user), Some(category)) = (record.author(), record.subreddit()) {
            bump(&mut self.user_posts, user, 1);
            bump(&mut self.user_category, &pair_key(user, category), 1);
        }
        Ok(())
    }

    fn merge(&mut self, other: Self) {
        merge_counts(&mut self.user_posts, other.user_posts);
        merge_counts(&mut self.user_category, other.user_category);
    }
}

/// Activity restricted to a category set, so unpopular subreddits never count
/// towards a user's activity.
pub struct ScopedActivity {
    scope: Scope,
    pub counts: ActivityCounts,
}

impl ScopedActivity {
    pub fn new(scope: Scope) -> Self {
        Self { scope, counts: ActivityCounts::default() }
    }
}

impl Aggregator for ScopedActivity {
    fn ingest(&mut self, record: &PostRecord) -> Result<()> {
        if self.scope.admit(record).is_some() {
            self.counts.ingest(record)?;
        }
        Ok(())
    }

    fn merge(&mut self, other: Self) {
        self.counts.merge(other.counts);
    }
}

/// User x category triplets for records whose author and subreddit both have ids.
pub struct MatrixCounter {
    users: Arc<IdAssignment>,
    categories: Arc<IdAssignment>,
    pub acc: TripletAccumulator,
    pub out_of_scope: u64,
}

impl MatrixCounter {
    pub fn new(users: Arc<IdAssignment>, categories: Arc<IdAssignment>, consolidate_every: usize) -> Self {
        Self { users, categories, acc: TripletAccumulator::new(consolidate_every), out_of_scope: 0 }
    }
}

impl Aggregator for MatrixCounter {
    fn ingest(&mut self, record: &PostRecord) -> Result<()> {
        let ids = record
            .author()
            .and_then(|u| self.users.id(u))
            .zip(record.subreddit().and_then(|c| self.categories.id(c)));
        match ids {
            Some((u, c)) => self.acc.push(u, c, 1),
            None => self.out_of_scope += 1,
        }
        Ok(())
    }

    fn merge(&mut self, other: Self) {
        self.acc.merge(other.acc);
        self.out_of_scope += other.out_of_scope;
    }
}

/// `user\tcategory\ttext` lines of in-scope records, text flattened to one line.
pub struct TextCollector {
    scope: Scope,
    pub lines: Vec<String>,
}

impl TextCollector {
    pub fn new(scope: Scope) -> Self {
        Self { scope, lines: Vec::new() }
    }
}

impl Aggregator for TextCollector {
    fn ingest(&mut self, record: &PostRecord) -> Result<()> {
        let Some((user, category)) = self.scope.admit(record) else { return Ok(()) };
        let text = one_line(&record.text());
        if !text.is_empty() {
            self.lines.push(format!("{user}\t{category}\t{text}"));
        }
        Ok(())
    }

    fn merge(&mut self, other: Self) {
        self.lines.extend(other.lines);
    }
}
