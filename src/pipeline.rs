use crate::bots::BotClassifier;
use crate::concurrency::WorkerPool;
use crate::config::{MalformedPolicy, PrepOptions, Sources};
use crate::counting::{
    reduce, scan_file, scan_shard, ActivityCounts, Aggregator, MatrixCounter, ScanContext, ScopedActivity, Scope,
    TextCollector, TokenCounter,
};
use crate::date::YearMonth;
use crate::entity::EntitySet;
use crate::error::PrepError;
use crate::filters::{h_index_filter, FilterChain};
use crate::jsonl::for_each_line;
use crate::merge::FreqMap;
use crate::paths::{self, ArtifactLayout, InputFile};
use crate::popularity::{popular_categories, PopularitySource};
use crate::sparse::{push_pair_counts, SparseMatrix, TripletAccumulator};
use crate::store::{
    ensure_json, ensure_with, load_json, load_triplets, save_json, save_lines, save_report, save_triplets,
    write_atomic_with, Artifact,
};
use crate::text::{SimpleTokenizer, Tokenizer};
use crate::util::{init_tracing_once, open_with_backoff, remove_with_backoff};
use crate::validity::{AcceptAll, EntryValidator};
use crate::vocab::Vocabulary;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Row/column ids used inside the matrix.
const MATRIX_ID_START: u32 = 0;
/// User/category ids written to the id-encoded text.
const TEXT_ID_START: u32 = 1;

#[derive(Clone)]
pub struct Preprocessor {
    pub(crate) opts: PrepOptions,
    validator: Arc<dyn EntryValidator>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Sizes of everything one full run produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub inputs: usize,
    pub categories: usize,
    pub users: usize,
    pub lm_users: usize,
    pub vocab: usize,
    pub matrix_shape: (usize, usize),
    pub matrix_nnz: usize,
    pub text_lines: u64,
    pub text_id_lines: u64,
}

impl Preprocessor {
    /// Defaults: every record is valid, [`SimpleTokenizer`].
    pub fn new() -> Self {
        Self { opts: PrepOptions::default(), validator: Arc::new(AcceptAll), tokenizer: Arc::new(SimpleTokenizer) }
    }

    pub fn with_options(opts: PrepOptions) -> Self {
        Self { opts, ..Self::new() }
    }

    // -------- Builder methods --------
    pub fn input_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_input_dir(dir); self }
    pub fn work_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_work_dir(dir); self }
    pub fn sources(mut self, sources: Sources) -> Self { self.opts = self.opts.with_sources(sources); self }
    pub fn date_range(mut self, start: Option<YearMonth>, end: Option<YearMonth>) -> Self { self.opts = self.opts.with_date_range(start, end); self }
    pub fn workers(mut self, n: usize) -> Self { self.opts = self.opts.with_workers(n); self }
    pub fn min_posts(mut self, n: u64) -> Self { self.opts = self.opts.with_min_posts(n); self }
    pub fn min_subscribers(mut self, n: u64) -> Self { self.opts = self.opts.with_min_subscribers(n); self }
    pub fn vocab_size(mut self, n: usize) -> Self { self.opts = self.opts.with_vocab_size(n); self }
    pub fn h_index_min(mut self, h: usize) -> Self { self.opts = self.opts.with_h_index_min(h); self }
    pub fn first_level_only(mut self, yes: bool) -> Self { self.opts = self.opts.with_first_level_only(yes); self }
    pub fn consolidate_every(mut self, n: usize) -> Self { self.opts = self.opts.with_consolidate_every(n); self }
    pub fn malformed_policy(mut self, policy: MalformedPolicy) -> Self { self.opts = self.opts.with_malformed_policy(policy); self }
    pub fn overwrite(mut self, yes: bool) -> Self { self.opts = self.opts.with_overwrite(yes); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self { self.opts = self.opts.with_io_buffers(read_bytes, write_bytes); self }

    /// Replace the record validity predicate. Production runs should supply one.
    pub fn validator(mut self, v: impl EntryValidator + 'static) -> Self {
        self.validator = Arc::new(v);
        self
    }

    pub fn tokenizer(mut self, t: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Arc::new(t);
        self
    }

    pub fn options(&self) -> &PrepOptions {
        &self.opts
    }

    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.opts)
    }

    fn pool(&self) -> Result<WorkerPool> {
        WorkerPool::new(self.opts.workers)
    }

    fn scan_context(&self) -> ScanContext<'_> {
        ScanContext {
            validator: self.validator.as_ref(),
            first_level_only: self.opts.first_level_only,
            malformed: self.opts.malformed,
            read_buffer_bytes: self.opts.read_buffer_bytes,
        }
    }

    // -------- Passes --------

    /// Monthly dump files selected by sources and date range, in processing order.
    pub fn discover_inputs(&self) -> Result<Vec<InputFile>> {
        init_tracing_once();
        let files = paths::discover_inputs(&self.opts)?;
        if files.is_empty() {
            tracing::warn!(input_dir = %self.opts.input_dir.display(), "no input files match the selection");
        } else {
            tracing::info!("planned {} input files", files.len());
        }
        Ok(files)
    }

    /// Categories whose popularity reaches `min_subscribers`. The popularity table and
    /// the resulting set are both cached under the work dir.
    pub fn valid_categories(&self, source: &dyn PopularitySource) -> Result<Artifact<EntitySet>> {
        init_tracing_once();
        let layout = self.layout();
        ensure_json(&layout.valid_categories(), self.opts.overwrite, || {
            let popularity: BTreeMap<String, u64> =
                ensure_json(&layout.popularity(), self.opts.overwrite, || source.fetch_popularity())?.into_inner();
            Ok(popular_categories(&popularity, self.opts.min_subscribers))
        })
    }

    /// Per-user and per user-category post counts inside `categories`. Each input file's
    /// counts are cached on their own, so an interrupted run resumes file by file.
    pub fn count_activity(&self, files: &[InputFile], categories: &EntitySet) -> Result<ActivityCounts> {
        init_tracing_once();
        let layout = self.layout();
        let ctx = self.scan_context();
        let scope = Scope::new(None, Some(Arc::new(categories.clone())));
        let parts = self.pool()?.fan_out("count activity", files, self.opts.progress, |shard| {
            let mut total = ActivityCounts::default();
            for input in shard.items {
                let cached = ensure_json(&layout.activity_for(&input.path), self.opts.overwrite, || {
                    let mut agg = ScopedActivity::new(scope.clone());
                    scan_file(&input.path, &ctx, &mut agg)?;
                    Ok(agg.counts)
                })?;
                total.merge(cached.into_inner());
                shard.tick();
            }
            Ok(total)
        })?;
        let mut activity = ActivityCounts::default();
        for part in parts {
            activity.merge(part);
        }
        tracing::info!(
            users = activity.user_posts.len(),
            pairs = activity.user_category.len(),
            "activity counted"
        );
        Ok(activity)
    }

    /// Minimum-activity and bot filtering. The classifier's known set, including
    /// names it learned here, is saved next to the user set.
    pub fn valid_users(&self, activity: &ActivityCounts, bots: &mut BotClassifier) -> Result<Artifact<EntitySet>> {
        init_tracing_once();
        let layout = self.layout();
        ensure_json(&layout.valid_users(), self.opts.overwrite, || {
            let (users, _reports) = FilterChain::new(self.opts.min_posts, &mut *bots).run(&activity.user_posts);
            save_json(&layout.known_bots(), &bots.known_names())?;
            Ok(users)
        })
    }

    /// Token frequencies of in-scope records, merged over all workers.
    pub fn count_tokens(&self, files: &[InputFile], scope: Scope) -> Result<FreqMap> {
        init_tracing_once();
        let ctx = self.scan_context();
        let tokenizer = self.tokenizer.clone();
        let parts = self.pool()?.fan_out("count tokens", files, self.opts.progress, |shard| {
            scan_shard(shard, &ctx, || TokenCounter::new(tokenizer.clone(), scope.clone()))
        })?;
        let (total, stats) = reduce(parts, TokenCounter::new(tokenizer, Scope::default()));
        tracing::info!(records = stats.accepted, distinct = total.counts.len(), "tokens counted");
        Ok(total.counts)
    }

    /// Top-K vocabulary over the posts of valid users in valid categories, plus the
    /// human-readable `token  count` report.
    pub fn build_vocab(
        &self,
        files: &[InputFile],
        users: &EntitySet,
        categories: &EntitySet,
    ) -> Result<Artifact<Vocabulary>> {
        init_tracing_once();
        let layout = self.layout();
        let load = |p: &Path| Vocabulary::from_map(&load_json::<BTreeMap<String, u32>>(p)?);
        ensure_with(&layout.vocab(), self.opts.overwrite, load, || {
            let scope = Scope::new(Some(Arc::new(users.clone())), Some(Arc::new(categories.clone())));
            let counts = self.count_tokens(files, scope)?;
            let (vocab, report) = Vocabulary::from_counts(&counts, self.opts.vocab_size)?;
            save_report(&layout.vocab_report(), &report)?;
            save_json(&layout.vocab(), &vocab.to_map())?;
            Ok(vocab)
        })
    }

    /// User x category post counts, shape pinned to `(|users|, |categories|)`.
    pub fn build_matrix(
        &self,
        files: &[InputFile],
        users: &EntitySet,
        categories: &EntitySet,
    ) -> Result<Artifact<SparseMatrix>> {
        init_tracing_once();
        let path = self.layout().matrix();
        let shape = (users.len(), categories.len());
        ensure_with(&path, self.opts.overwrite, |p| load_matrix(p, shape), || {
            let user_ids = Arc::new(users.assign_ids(MATRIX_ID_START)?);
            let cat_ids = Arc::new(categories.assign_ids(MATRIX_ID_START)?);
            let every = self.opts.consolidate_every;
            let ctx = self.scan_context();
            let parts = self.pool()?.fan_out("build matrix", files, self.opts.progress, |shard| {
                scan_shard(shard, &ctx, || MatrixCounter::new(user_ids.clone(), cat_ids.clone(), every))
            })?;
            let (total, stats) = reduce(parts, MatrixCounter::new(user_ids.clone(), cat_ids.clone(), every));
            tracing::info!(
                records = stats.accepted,
                out_of_scope = total.out_of_scope,
                consolidations = total.acc.consolidations(),
                "matrix counted"
            );
            let matrix = total.acc.into_matrix(user_ids.len(), cat_ids.len())?;
            save_triplets(&path, &matrix.to_persisted())?;
            Ok(matrix)
        })
    }

    /// The same matrix, built from already merged `"user category"` counts.
    pub fn matrix_from_activity(
        &self,
        activity: &ActivityCounts,
        users: &EntitySet,
        categories: &EntitySet,
    ) -> Result<Artifact<SparseMatrix>> {
        init_tracing_once();
        let path = self.layout().matrix_from_activity();
        let shape = (users.len(), categories.len());
        ensure_with(&path, self.opts.overwrite, |p| load_matrix(p, shape), || {
            let user_ids = users.assign_ids(MATRIX_ID_START)?;
            let cat_ids = categories.assign_ids(MATRIX_ID_START)?;
            let mut acc = TripletAccumulator::new(self.opts.consolidate_every);
            let skipped = push_pair_counts(&mut acc, &activity.user_category, &user_ids, &cat_ids);
            tracing::debug!(skipped, "pairs without a valid user or category");
            let matrix = acc.into_matrix(shape.0, shape.1)?;
            save_triplets(&path, &matrix.to_persisted())?;
            Ok(matrix)
        })
    }

    /// Users whose category counts reach the h-index threshold. `matrix` must have
    /// been built from `users`.
    pub fn lm_valid_users(&self, users: &EntitySet, matrix: &SparseMatrix) -> Result<Artifact<EntitySet>> {
        init_tracing_once();
        ensure_json(&self.layout().lm_users(), self.opts.overwrite, || {
            let ids = users.assign_ids(MATRIX_ID_START)?;
            let (kept, _report) = h_index_filter(matrix, &ids, self.opts.h_index_min)?;
            Ok(kept)
        })
    }

    /// `user\tcategory\ttext` lines for in-scope records. Each shard writes a part
    /// file; the parts are concatenated in shard order.
    pub fn export_text(&self, files: &[InputFile], users: &EntitySet, categories: &EntitySet) -> Result<Artifact<u64>> {
        init_tracing_once();
        let path = self.layout().text();
        ensure_with(&path, self.opts.overwrite, count_lines, || {
            let scope = Scope::new(Some(Arc::new(users.clone())), Some(Arc::new(categories.clone())));
            let ctx = self.scan_context();
            let parts = self.pool()?.fan_out("export text", files, self.opts.progress, |shard| {
                let (collected, _) = scan_shard(shard, &ctx, || TextCollector::new(scope.clone()))?;
                let part = part_path(&path, shard.index);
                save_lines(&part, &collected.lines)?;
                Ok((part, collected.lines.len() as u64))
            });
            let parts = match parts {
                Ok(parts) => parts,
                Err(e) => {
                    remove_parts(&path, self.opts.workers);
                    return Err(e);
                }
            };
            let total: u64 = parts.iter().map(|(_, n)| n).sum();
            write_atomic_with(&path, self.opts.write_buffer_bytes, |w| {
                for (part, _) in &parts {
                    let f = open_with_backoff(part).with_context(|| format!("open {}", part.display()))?;
                    std::io::copy(&mut BufReader::new(f), &mut *w)?;
                }
                Ok(())
            })?;
            for (part, _) in &parts {
                remove_with_backoff(part)?;
            }
            tracing::info!(lines = total, path = %path.display(), "text exported");
            Ok(total)
        })
    }

    /// Rewrite the text export as ids: `user_id\tcategory_id\tsentence\tsentence…`
    /// where each sentence is space-separated word ids. User and category ids start
    /// at 1. Posts with no words are dropped.
    pub fn text_to_ids(&self, vocab: &Vocabulary, users: &EntitySet, categories: &EntitySet) -> Result<Artifact<u64>> {
        init_tracing_once();
        let layout = self.layout();
        let text = layout.text();
        if !text.exists() {
            return Err(PrepError::MissingPrerequisite { what: "text export".into(), path: text }.into());
        }
        let out = layout.text_ids();
        ensure_with(&out, self.opts.overwrite, count_lines, || {
            let user_ids = users.assign_ids(TEXT_ID_START)?;
            let cat_ids = categories.assign_ids(TEXT_ID_START)?;
            let mut written = 0u64;
            let mut unknown = 0u64;
            write_atomic_with(&out, self.opts.write_buffer_bytes, |w| {
                for_each_line(&text, self.opts.read_buffer_bytes, |line_no, line| {
                    let mut fields = line.splitn(3, '\t');
                    let (Some(user), Some(category), Some(body)) = (fields.next(), fields.next(), fields.next()) else {
                        return Err(PrepError::malformed(&text, line_no, "expected user<TAB>category<TAB>text", line).into());
                    };
                    let (Some(uid), Some(cid)) = (user_ids.id(user), cat_ids.id(category)) else {
                        unknown += 1;
                        return Ok(());
                    };
                    let sentences: Vec<String> = self
                        .tokenizer
                        .tokenize_sentences(body)
                        .iter()
                        .map(|words| {
                            vocab.ids_for(words).iter().map(u32::to_string).collect::<Vec<_>>().join(" ")
                        })
                        .collect();
                    if sentences.is_empty() {
                        return Ok(());
                    }
                    writeln!(w, "{uid}\t{cid}\t{}", sentences.join("\t"))?;
                    written += 1;
                    Ok(())
                })
            })?;
            if unknown > 0 {
                tracing::warn!(unknown, "text lines with a user or category outside the sets");
            }
            tracing::info!(lines = written, path = %out.display(), "text converted to ids");
            Ok(written)
        })
    }

    /// Every pass in order. Returns the sizes of what was produced or reused.
    pub fn run(&self, popularity: &dyn PopularitySource) -> Result<RunSummary> {
        init_tracing_once();
        self.opts.log_summary();
        let files = self.discover_inputs()?;
        let categories = self.valid_categories(popularity)?.into_inner();
        let activity = self.count_activity(&files, &categories)?;
        let mut bots = BotClassifier::new().with_env_extras();
        let users = self.valid_users(&activity, &mut bots)?.into_inner();
        let vocab = self.build_vocab(&files, &users, &categories)?.into_inner();
        let matrix = self.build_matrix(&files, &users, &categories)?.into_inner();
        let lm_users = self.lm_valid_users(&users, &matrix)?.into_inner();
        let text_lines = self.export_text(&files, &users, &categories)?.into_inner();
        let text_id_lines = self.text_to_ids(&vocab, &users, &categories)?.into_inner();
        Ok(RunSummary {
            inputs: files.len(),
            categories: categories.len(),
            users: users.len(),
            lm_users: lm_users.len(),
            vocab: vocab.len(),
            matrix_shape: matrix.shape(),
            matrix_nnz: matrix.nnz(),
            text_lines,
            text_id_lines,
        })
    }
}

/// Load a persisted matrix and check it against the entity sets it was built from.
fn load_matrix(path: &Path, shape: (usize, usize)) -> Result<SparseMatrix> {
    SparseMatrix::from_persisted_with_shape(load_triplets(path)?, shape)
}

fn count_lines(path: &Path) -> Result<u64> {
    let f = open_with_backoff(path).with_context(|| format!("open {}", path.display()))?;
    let mut n = 0u64;
    for line in BufReader::new(f).lines() {
        line?;
        n += 1;
    }
    Ok(n)
}

fn part_path(path: &Path, shard: usize) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".part{shard:03}"));
    path.with_file_name(name)
}

fn remove_parts(path: &Path, workers: usize) {
    for i in 0..workers {
        let part = part_path(path, i);
        if let Err(e) = remove_with_backoff(&part) {
            tracing::warn!("leaving {}: {e:#}", part.display());
        }
    }
}
