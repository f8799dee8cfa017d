mod config;
mod date;
mod error;
mod paths;
mod jsonl;
mod validity;
mod text;

mod partition;
mod concurrency;
mod counting;
mod merge;
mod progress;
mod util;
mod mem;

mod ids;
mod entity;
mod vocab;
mod bots;
mod filters;
mod sparse;
mod popularity;
mod store;
mod pipeline;

pub use crate::config::{MalformedPolicy, PrepOptions, Sources};
pub use crate::date::YearMonth;
pub use crate::error::PrepError;
pub use crate::paths::{discover_inputs, ArtifactLayout, FileKind, InputFile};
pub use crate::jsonl::{for_each_line, parse_record, PostRecord};
pub use crate::validity::{AcceptAll, EntryValidator, FirstLevelOnly};
pub use crate::text::{one_line, simplify_post, SimpleTokenizer, Tokenizer};
pub use crate::pipeline::{Preprocessor, RunSummary};

// fan-out/fan-in and the counters it runs
pub use crate::partition::{partition, shard_len};
pub use crate::concurrency::{Shard, WorkerPool};
pub use crate::counting::{
    reduce, scan_file, scan_shard, ActivityCounts, Aggregator, MatrixCounter, ScanContext, ScanStats, Scope,
    ScopedActivity, TextCollector, TokenCounter,
};
pub use crate::merge::{bump, combine_counts, merge_counts, new_freq_map, pair_key, split_pair_key, FreqMap};

// entity sets, ids and filtering
pub use crate::ids::IdAssignment;
pub use crate::entity::EntitySet;
pub use crate::vocab::{rank_by_count, top_k, Vocabulary, FIRST_WORD_ID, RESERVED_TOKENS, SENT_END, SENT_START, UNK};
pub use crate::bots::{looks_like_bot, BotClassifier, KNOWN_BOT_NAMES};
pub use crate::filters::{
    bot_filter, effective_min_posts, h_index, h_index_filter, min_activity_filter, row_h_index, FilterChain,
    StageReport, ABSOLUTE_MIN_POSTS,
};
pub use crate::sparse::{push_pair_counts, SparseMatrix, Triplet, TripletAccumulator};
pub use crate::popularity::{popular_categories, PopularitySource, StaticPopularity, TsvPopularity};

// persistence and the build-or-reuse contract
pub use crate::store::{ensure_json, ensure_with, load_json, load_triplets, save_json, save_triplets, Artifact, Origin};

// Expose multiprogress and progress helpers.
pub use crate::progress::{set_global_multiprogress, ProgressScope};

// Expose memory helpers for adaptive throttling from the binary.
pub use crate::mem::{available_memory_fraction, is_low_memory};

pub use crate::util::init_tracing_once;
