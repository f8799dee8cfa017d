use crate::ids::IdAssignment;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An authoritative set of validated names (users or subreddits). Built once per
/// configuration and then only read: it fixes the matrix dimensions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitySet {
    names: BTreeSet<String>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Names in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    /// Lexicographic id assignment starting at `start`.
    pub fn assign_ids(&self, start: u32) -> Result<IdAssignment> {
        IdAssignment::new(self.names.iter().cloned(), start)
    }

    pub(crate) fn insert(&mut self, name: String) -> bool {
        self.names.insert(name)
    }
}

impl<S: Into<String>> FromIterator<S> for EntitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { names: iter.into_iter().map(Into::into).collect() }
    }
}
