use crate::date::YearMonth;
use std::path::{Path, PathBuf};

/// Data source toggle (comments, submissions, both).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sources {
    Comments,
    Submissions,
    Both,
}

/// What a worker does when one line fails to parse or the validity predicate errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Stop the owning shard at the bad line; the whole pass reports the error after the join.
    FailShard,
    /// Log, count as skipped, keep going.
    SkipRecord,
}

/// Run parameters with defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct PrepOptions {
    pub input_dir: PathBuf,
    pub comments_dir: PathBuf,
    pub submissions_dir: PathBuf,
    pub work_dir: PathBuf,
    pub sources: Sources,
    pub start: Option<YearMonth>, // inclusive
    pub end: Option<YearMonth>,   // inclusive

    pub workers: usize,
    pub min_posts: u64,
    pub min_subscribers: u64,
    pub vocab_size: usize,
    pub h_index_min: usize,
    pub first_level_only: bool,
    pub consolidate_every: usize, // pending triplets before a forced consolidation
    pub malformed: MalformedPolicy,
    pub overwrite: bool,
    pub progress: bool,

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
}

impl Default for PrepOptions {
    fn default() -> Self {
        let input = PathBuf::from("./data/raw");
        Self {
            comments_dir: input.join("comments"),
            submissions_dir: input.join("submissions"),
            input_dir: input,
            work_dir: PathBuf::from("./prep_work"),
            sources: Sources::Comments,
            start: None,
            end: None,

            workers: 16,
            min_posts: 100,
            min_subscribers: 50_000,
            vocab_size: 25_000,
            h_index_min: 10,
            first_level_only: false,
            consolidate_every: 10_000,
            malformed: MalformedPolicy::FailShard,
            overwrite: false,
            progress: true,

            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl PrepOptions {
    pub fn with_input_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let base = dir.as_ref().to_path_buf();
        self.comments_dir = base.join("comments");
        self.submissions_dir = base.join("submissions");
        self.input_dir = base;
        self
    }
    pub fn with_work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.work_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_sources(mut self, sources: Sources) -> Self {
        self.sources = sources;
        self
    }
    pub fn with_date_range(mut self, start: Option<YearMonth>, end: Option<YearMonth>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }
    pub fn with_min_posts(mut self, n: u64) -> Self {
        self.min_posts = n;
        self
    }
    pub fn with_min_subscribers(mut self, n: u64) -> Self {
        self.min_subscribers = n;
        self
    }
    pub fn with_vocab_size(mut self, n: usize) -> Self {
        // room for the three reserved tokens
        self.vocab_size = n.max(3);
        self
    }
    pub fn with_h_index_min(mut self, h: usize) -> Self {
        self.h_index_min = h;
        self
    }
    pub fn with_first_level_only(mut self, yes: bool) -> Self {
        self.first_level_only = yes;
        self
    }
    pub fn with_consolidate_every(mut self, n: usize) -> Self {
        self.consolidate_every = n.max(1);
        self
    }
    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed = policy;
        self
    }
    pub fn with_overwrite(mut self, yes: bool) -> Self {
        self.overwrite = yes;
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }

    /// One line with the parameters that shape every artifact of this run.
    pub fn log_summary(&self) {
        tracing::info!(
            min_subscribers = self.min_subscribers,
            min_posts = self.min_posts,
            vocab_size = self.vocab_size,
            h_index_min = self.h_index_min,
            first_level = self.first_level_only,
            workers = self.workers,
            "run parameters"
        );
    }
}
