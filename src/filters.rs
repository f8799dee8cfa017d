//! User population filters: minimum activity, bots, and the h-index threshold.

use crate::bots::BotClassifier;
use crate::entity::EntitySet;
use crate::error::PrepError;
use crate::ids::IdAssignment;
use crate::merge::FreqMap;
use crate::sparse::SparseMatrix;
use anyhow::Result;

/// Floor on the post count a user needs, whatever the configured minimum.
pub const ABSOLUTE_MIN_POSTS: u64 = 20;

/// Before/after sizes of one filter stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub before: usize,
    pub after: usize,
}

impl StageReport {
    pub fn removed(&self) -> usize {
        self.before - self.after
    }

    fn log(&self) {
        tracing::info!(
            stage = self.stage,
            before = self.before,
            after = self.after,
            removed = self.removed(),
            "filter stage"
        );
    }
}

/// The post count a user needs: `max(min_posts, ABSOLUTE_MIN_POSTS)`.
pub fn effective_min_posts(min_posts: u64) -> u64 {
    min_posts.max(ABSOLUTE_MIN_POSTS)
}

/// Users whose post count reaches the effective minimum.
pub fn min_activity_filter(post_counts: &FreqMap, min_posts: u64) -> (EntitySet, StageReport) {
    let floor = effective_min_posts(min_posts);
    let kept: EntitySet = post_counts
        .iter()
        .filter(|(_, n)| **n >= floor)
        .map(|(name, _)| name.clone())
        .collect();
    let report = StageReport { stage: "min_posts", before: post_counts.len(), after: kept.len() };
    (kept, report)
}

/// Users the classifier does not consider bots. Heuristic hits are remembered by
/// `bots` for the rest of the run.
pub fn bot_filter(users: &EntitySet, bots: &mut BotClassifier) -> (EntitySet, StageReport) {
    let kept: EntitySet = users.iter().filter(|u| !bots.is_bot(u)).collect();
    let report = StageReport { stage: "bots", before: users.len(), after: kept.len() };
    (kept, report)
}

/// Minimum-activity then bot filtering over per-user post counts.
pub struct FilterChain<'a> {
    min_posts: u64,
    bots: &'a mut BotClassifier,
}

impl<'a> FilterChain<'a> {
    pub fn new(min_posts: u64, bots: &'a mut BotClassifier) -> Self {
        Self { min_posts, bots }
    }

    pub fn run(&mut self, post_counts: &FreqMap) -> (EntitySet, Vec<StageReport>) {
        let (active, r1) = min_activity_filter(post_counts, self.min_posts);
        r1.log();
        let (humans, r2) = bot_filter(&active, self.bots);
        r2.log();
        tracing::info!(known_bots = self.bots.known_len(), learned = self.bots.learned(), "bot classifier");
        (humans, vec![r1, r2])
    }
}

/// Largest `h` such that the `h`-th largest count is at least `h`.
/// `sorted_desc` must be sorted in descending order.
pub fn h_index(sorted_desc: &[u64]) -> usize {
    sorted_desc
        .iter()
        .enumerate()
        .take_while(|&(i, &c)| c >= (i as u64 + 1))
        .count()
}

/// h-index of one matrix row.
pub fn row_h_index(matrix: &SparseMatrix, row: usize) -> usize {
    let mut counts = matrix.row_values(row).to_vec();
    counts.sort_unstable_by(|a, b| b.cmp(a));
    h_index(&counts)
}

/// Keep users whose per-category counts have an h-index of at least `h_index_min`.
///
/// Row `u` of `matrix` must belong to the user with id `u` in `user_ids`; the row
/// count has to equal the number of users or this fails with a shape mismatch.
pub fn h_index_filter(
    matrix: &SparseMatrix,
    user_ids: &IdAssignment,
    h_index_min: usize,
) -> Result<(EntitySet, StageReport)> {
    if user_ids.len() != matrix.rows() {
        return Err(PrepError::shape("user ids vs matrix rows", user_ids.len(), matrix.rows()).into());
    }
    let mut kept = EntitySet::new();
    for (name, id) in user_ids.iter() {
        let row = (id - user_ids.start()) as usize;
        if row_h_index(matrix, row) >= h_index_min {
            kept.insert(name.to_string());
        }
    }
    let report = StageReport { stage: "h_index", before: user_ids.len(), after: kept.len() };
    report.log();
    Ok((kept, report))
}
