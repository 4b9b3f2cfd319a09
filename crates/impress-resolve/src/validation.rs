//! Cluster attribute validation
//!
//! Flags clusters whose members disagree on an attribute that should be
//! constant per entity (nationality, entity subtype, ...). Missing or blank
//! values never conflict.
//!
//! Scalar attributes conflict as soon as two distinct values appear. List
//! attributes (several values in one cell, e.g. `painter; sculptor`)
//! conflict only when the members' value sets share no element.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::record::{ClusterAssignment, ClusterId, NameRecord};

/// Separator used for list-valued cells when none is given.
pub const DEFAULT_LIST_SEPARATOR: char = ';';

/// How the values of one attribute are compared within a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Scalar,
    /// Cell holds several values split on `separator`
    List { separator: char },
}

/// One attribute to validate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeCheck {
    pub column: String,
    pub kind: AttributeKind,
}

impl AttributeCheck {
    pub fn scalar(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            kind: AttributeKind::Scalar,
        }
    }

    pub fn list(column: impl Into<String>, separator: char) -> Self {
        Self {
            column: column.into(),
            kind: AttributeKind::List { separator },
        }
    }
}

/// Disagreeing values of one attribute within one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeConflict {
    pub cluster_id: ClusterId,
    pub attribute: String,
    /// Distinct cell values in first-seen order
    pub values: Vec<String>,
}

/// Report every cluster/attribute pair with more than one distinct value.
///
/// Conflicts are ordered by cluster id, then by the order of `columns`.
pub fn find_attribute_conflicts(
    records: &[NameRecord],
    assignments: &[ClusterAssignment],
    columns: &[String],
) -> Vec<AttributeConflict> {
    let checks: Vec<AttributeCheck> = columns.iter().map(AttributeCheck::scalar).collect();
    validate_clusters(records, assignments, &checks)
}

/// Run every check against every cluster.
///
/// Conflicts are ordered by cluster id, then by the order of `checks`.
pub fn validate_clusters(
    records: &[NameRecord],
    assignments: &[ClusterAssignment],
    checks: &[AttributeCheck],
) -> Vec<AttributeConflict> {
    let by_index: HashMap<usize, &NameRecord> = records.iter().map(|r| (r.index, r)).collect();

    let mut clusters: BTreeMap<ClusterId, Vec<&NameRecord>> = BTreeMap::new();
    for assignment in assignments {
        if let Some(&record) = by_index.get(&assignment.record) {
            clusters.entry(assignment.cluster_id).or_default().push(record);
        }
    }

    let mut conflicts = Vec::new();
    for (cluster_id, members) in &clusters {
        for check in checks {
            let values = distinct_values(members, &check.column);
            let conflicting = match check.kind {
                AttributeKind::Scalar => values.len() > 1,
                AttributeKind::List { separator } => lists_disjoint(&values, separator),
            };
            if conflicting {
                conflicts.push(AttributeConflict {
                    cluster_id: *cluster_id,
                    attribute: check.column.clone(),
                    values,
                });
            }
        }
    }

    conflicts
}

fn distinct_values(members: &[&NameRecord], column: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for value in members.iter().filter_map(|m| m.attribute(column)) {
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }
    values
}

/// True when the split cells have no element common to all of them.
/// Cells with no element after splitting count as missing.
fn lists_disjoint(cells: &[String], separator: char) -> bool {
    let mut common: Option<BTreeSet<&str>> = None;
    for cell in cells {
        let items: BTreeSet<&str> = cell
            .split(separator)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect();
        if items.is_empty() {
            continue;
        }
        common = Some(match common {
            None => items,
            Some(common) => common.intersection(&items).copied().collect(),
        });
    }
    common.is_some_and(|common| common.is_empty())
}
