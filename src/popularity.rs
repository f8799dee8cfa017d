//! Category popularity (subscriber counts) and the category Entity Set derived from it.

use crate::entity::EntitySet;
use crate::util::open_with_backoff;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Source of `category -> popularity`. Network crawlers, snapshots and fixtures
/// all plug in here.
pub trait PopularitySource {
    fn fetch_popularity(&self) -> Result<BTreeMap<String, u64>>;
}

/// Fixed in-memory mapping.
#[derive(Clone, Debug, Default)]
pub struct StaticPopularity(pub BTreeMap<String, u64>);

impl PopularitySource for StaticPopularity {
    fn fetch_popularity(&self) -> Result<BTreeMap<String, u64>> {
        Ok(self.0.clone())
    }
}

/// `name<TAB>count` snapshot file. Thousands separators (`1,234`) are accepted;
/// blank lines and `#` comments are skipped.
#[derive(Clone, Debug)]
pub struct TsvPopularity {
    pub path: PathBuf,
}

impl TsvPopularity {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl PopularitySource for TsvPopularity {
    fn fetch_popularity(&self) -> Result<BTreeMap<String, u64>> {
        let f = open_with_backoff(&self.path).with_context(|| format!("open {}", self.path.display()))?;
        let mut out = BTreeMap::new();
        for (i, line) in BufReader::new(f).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, count) = line
                .split_once('\t')
                .with_context(|| format!("{}:{}: expected name<TAB>count", self.path.display(), i + 1))?;
            let count: u64 = count
                .trim()
                .replace(',', "")
                .parse()
                .with_context(|| format!("{}:{}: bad count {count:?}", self.path.display(), i + 1))?;
            let name = name.trim().trim_start_matches("/r/").trim_start_matches("r/");
            out.insert(name.to_string(), count);
        }
        Ok(out)
    }
}

/// Categories whose popularity reaches `min_popularity`.
pub fn popular_categories(popularity: &BTreeMap<String, u64>, min_popularity: u64) -> EntitySet {
    let set: EntitySet = popularity
        .iter()
        .filter(|(_, n)| **n >= min_popularity)
        .map(|(name, _)| name.clone())
        .collect();
    tracing::info!(total = popularity.len(), kept = set.len(), min_popularity, "category set");
    set
}
