//! Dense, reproducible ids for a set of names: sort lexicographically, number from `start`.

use crate::error::PrepError;
use ahash::RandomState;
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};

/// Bijection name <-> id over `[start, start + len)`.
#[derive(Clone, Debug)]
pub struct IdAssignment {
    start: u32,
    names: Vec<String>, // sorted; names[i] has id start + i
    index: HashMap<String, u32, RandomState>,
}

impl IdAssignment {
    /// Assign ids in sorted name order. Duplicate names are rejected.
    pub fn new<I, S>(names: I, start: u32) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort_unstable();
        if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(PrepError::DuplicateKey { name: w[0].clone() }.into());
        }
        let index: HashMap<String, u32, RandomState> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), start + i as u32))
            .collect();
        if index.len() != names.len() {
            return Err(PrepError::shape("id assignment", names.len(), index.len()).into());
        }
        Ok(Self { start, names, index })
    }

    /// Rebuild from a persisted name -> id table. The ids must be exactly the sorted
    /// assignment over `[start, start + len)`.
    pub fn from_map(map: &BTreeMap<String, u32>, start: u32) -> Result<Self> {
        let mut seen: HashMap<u32, &str, RandomState> = HashMap::default();
        for (name, &id) in map {
            if seen.insert(id, name).is_some() {
                return Err(PrepError::DuplicateId { id }.into());
            }
        }
        let built = Self::new(map.keys().cloned(), start)?;
        for (name, &id) in map {
            if built.id(name) != Some(id) {
                anyhow::bail!("id table is not the sorted assignment: {name} -> {id}");
            }
        }
        Ok(built)
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[inline]
    pub fn id(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    #[inline]
    pub fn name(&self, id: u32) -> Option<&str> {
        let i = id.checked_sub(self.start)? as usize;
        self.names.get(i).map(String::as_str)
    }

    /// (name, id) pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.names.iter().enumerate().map(move |(i, n)| (n.as_str(), self.start + i as u32))
    }

    pub fn to_map(&self) -> BTreeMap<String, u32> {
        self.iter().map(|(n, id)| (n.to_string(), id)).collect()
    }

    /// id -> name table.
    pub fn inverse(&self) -> BTreeMap<u32, String> {
        self.iter().map(|(n, id)| (id, n.to_string())).collect()
    }
}
