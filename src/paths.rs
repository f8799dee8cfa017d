use crate::config::{PrepOptions, Sources};
use crate::date::{range_label, YearMonth};
use anyhow::Result;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Type of monthly dump file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileKind {
    Comment,    // RC_YYYY-MM[.ext]
    Submission, // RS_YYYY-MM[.ext]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputFile {
    pub kind: FileKind,
    pub ym: YearMonth,
    pub path: PathBuf,
}

fn discover_month_map(dir: &Path, kind: FileKind) -> Result<BTreeMap<YearMonth, PathBuf>> {
    let prefix = match kind {
        FileKind::Comment => "RC",
        FileKind::Submission => "RS",
    };
    let re = Regex::new(&format!(r"^{prefix}_(\d{{4}})-(\d{{2}})(?:\.(?:json|jsonl|ndjson|zst))?$"))?;

    let mut map = BTreeMap::new();
    if !dir.exists() {
        return Ok(map);
    }
    let mut names: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    names.sort();

    for path in names {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        let Some(caps) = re.captures(name) else { continue };
        let year: u16 = caps[1].parse()?;
        let month: u8 = caps[2].parse()?;
        if !(1..=12).contains(&month) {
            continue;
        }
        let ym = YearMonth { year, month };
        if let Some(prev) = map.get(&ym) {
            tracing::warn!(kept = %prev.display(), ignored = %path.display(), "two dump files for the same month");
            continue;
        }
        map.insert(ym, path);
    }
    Ok(map)
}

/// Ordered input list: comments before submissions, each chronologically, restricted
/// to the configured sources and inclusive month range.
pub fn discover_inputs(opts: &PrepOptions) -> Result<Vec<InputFile>> {
    let mut out = Vec::new();
    let mut push = |kind: FileKind, dir: &Path| -> Result<()> {
        for (ym, path) in discover_month_map(dir, kind)? {
            if ym.within(opts.start, opts.end) {
                out.push(InputFile { kind, ym, path });
            }
        }
        Ok(())
    };
    match opts.sources {
        Sources::Comments => push(FileKind::Comment, &opts.comments_dir)?,
        Sources::Submissions => push(FileKind::Submission, &opts.submissions_dir)?,
        Sources::Both => {
            push(FileKind::Comment, &opts.comments_dir)?;
            push(FileKind::Submission, &opts.submissions_dir)?;
        }
    }
    Ok(out)
}

/// Deterministic artifact names under the work dir, derived from the run parameters.
#[derive(Clone, Debug)]
pub struct ArtifactLayout {
    root: PathBuf,
    range: String,
    fl: &'static str,
    min_subscribers: u64,
    min_posts: u64,
    vocab_size: usize,
    h_index_min: usize,
}

impl ArtifactLayout {
    pub fn new(opts: &PrepOptions) -> Self {
        Self {
            root: opts.work_dir.clone(),
            range: range_label(opts.start, opts.end),
            fl: if opts.first_level_only { "fl_" } else { "" },
            min_subscribers: opts.min_subscribers,
            min_posts: opts.min_posts,
            vocab_size: opts.vocab_size,
            h_index_min: opts.h_index_min,
        }
    }

    fn users_run(&self) -> String {
        format!("{}_{}{}_{}", self.range, self.fl, self.min_subscribers, self.min_posts)
    }

    fn full_run(&self) -> String {
        format!(
            "{}_{}{}_{}_{}",
            self.range, self.fl, self.min_subscribers, self.min_posts, self.vocab_size
        )
    }

    pub fn popularity(&self) -> PathBuf {
        self.root.join("valid").join("subscribers.json")
    }
    pub fn valid_categories(&self) -> PathBuf {
        self.root.join("valid").join(format!("valid_subreddits_{}.json", self.min_subscribers))
    }
    pub fn known_bots(&self) -> PathBuf {
        self.root.join("valid").join(format!("known_bots_{}.json", self.min_subscribers))
    }
    pub fn valid_users(&self) -> PathBuf {
        self.root.join("valid").join(format!("valid_users_{}.json", self.users_run()))
    }
    pub fn lm_users(&self) -> PathBuf {
        self.root
            .join("valid")
            .join(format!("lm_users_{}_h{}.json", self.users_run(), self.h_index_min))
    }

    /// Per-input cached `(user, user category)` counts.
    pub fn activity_for(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.split('.').next().unwrap_or(s))
            .unwrap_or("part");
        self.root
            .join("user_category")
            .join(format!("{}_{}{}_activity.json", stem, self.fl, self.min_subscribers))
    }

    pub fn vocab(&self) -> PathBuf {
        self.root.join("vocab").join(format!("vocab_{}.json", self.full_run()))
    }
    pub fn vocab_report(&self) -> PathBuf {
        self.root.join("vocab").join(format!("vocab_{}.txt", self.full_run()))
    }
    pub fn matrix(&self) -> PathBuf {
        self.root.join("matrix").join(format!("uxs_{}.tsv", self.users_run()))
    }
    pub fn matrix_from_activity(&self) -> PathBuf {
        self.root.join("matrix").join(format!("uxs_dict_{}.tsv", self.users_run()))
    }
    pub fn text(&self) -> PathBuf {
        self.root.join("text").join(format!("text_{}.tsv", self.full_run()))
    }
    pub fn text_ids(&self) -> PathBuf {
        self.root.join("text").join(format!("text_ids_{}.tsv", self.full_run()))
    }
}
