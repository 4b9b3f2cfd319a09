//! Records, cluster ids and assignments

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalization::Normalizer;

/// One entity mention: a raw name, its normalized form, and the
/// discriminating attributes carried alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameRecord {
    /// Position of the mention in the input table
    pub index: usize,
    pub raw_name: String,
    pub normalized_name: String,
    pub attributes: BTreeMap<String, Option<String>>,
}

impl NameRecord {
    /// Create a record, normalizing the name with `normalizer`.
    pub fn new(index: usize, raw_name: impl Into<String>, normalizer: &Normalizer) -> Self {
        let raw_name = raw_name.into();
        let normalized_name = normalizer.normalize(&raw_name);
        Self {
            index,
            raw_name,
            normalized_name,
            attributes: BTreeMap::new(),
        }
    }

    /// Attach an attribute value (builder style).
    pub fn with_attribute(mut self, column: impl Into<String>, value: Option<&str>) -> Self {
        self.attributes
            .insert(column.into(), value.map(|v| v.to_string()));
        self
    }

    /// The attribute value, or `None` when absent, null, or blank.
    pub fn attribute(&self, column: &str) -> Option<&str> {
        self.attributes
            .get(column)
            .and_then(|v| v.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Values of `columns` in order, or `None` if any of them is missing.
    pub fn partition_key(&self, columns: &[String]) -> Option<Vec<String>> {
        columns
            .iter()
            .map(|column| self.attribute(column).map(str::to_string))
            .collect()
    }
}

/// Cluster identifier, unique within one resolution run. Always positive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClusterId(pub u64);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out fresh cluster ids; threaded explicitly through both phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterIdSequence {
    next: u64,
}

impl Default for ClusterIdSequence {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl ClusterIdSequence {
    /// Start a sequence at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a sequence at `first` (values below 1 start at 1).
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: first.max(1),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> ClusterId {
        let id = ClusterId(self.next);
        self.next += 1;
        id
    }

    /// Reserve `count` consecutive ids, returning the first.
    pub fn reserve(&mut self, count: usize) -> ClusterId {
        let first = ClusterId(self.next);
        self.next += count as u64;
        first
    }

    /// The id the next call to `next_id` would return.
    pub fn peek(&self) -> ClusterId {
        ClusterId(self.next)
    }
}

/// The resolved cluster of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    /// `NameRecord::index` of the assigned record
    pub record: usize,
    pub cluster_id: ClusterId,
    pub cluster_rep: String,
}
