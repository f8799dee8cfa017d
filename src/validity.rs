//! The pluggable "does this record take part in counting" predicate.

use crate::jsonl::PostRecord;
use anyhow::Result;

/// Decides whether a parsed record participates in counting.
///
/// `Ok(false)` is an ordinary rejection. `Err(_)` means the predicate could not judge
/// the record at all and is handled by the run's `MalformedPolicy`.
///
/// The default, [`AcceptAll`], keeps everything; production runs are expected to
/// supply their own rule (language detection, date windows, spam heuristics, ...).
pub trait EntryValidator: Send + Sync {
    fn is_valid(&self, record: &PostRecord) -> Result<bool>;
}

impl<F> EntryValidator for F
where
    F: Fn(&PostRecord) -> bool + Send + Sync,
{
    fn is_valid(&self, record: &PostRecord) -> Result<bool> {
        Ok(self(record))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl EntryValidator for AcceptAll {
    fn is_valid(&self, _record: &PostRecord) -> Result<bool> {
        Ok(true)
    }
}

/// Keeps top-level comments (parent is the submission, `t3_…`). Records without a
/// `parent_id` are submissions and pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstLevelOnly;

impl EntryValidator for FirstLevelOnly {
    fn is_valid(&self, record: &PostRecord) -> Result<bool> {
        Ok(match record.parent_id.as_deref() {
            Some(parent) => parent.starts_with("t3_"),
            None => true,
        })
    }
}
