//! Incremental assignment of records that could not be partitioned
//!
//! Each record, in input order, is compared against every distinct cluster
//! representative known so far, including clusters opened earlier in the
//! same pass. It joins the nearest cluster when the distance is within the
//! threshold, keeping that cluster's representative unchanged; otherwise it
//! opens a singleton cluster under a fresh id. Decisions depend on earlier
//! ones, so the pass is strictly sequential.

use std::collections::HashMap;

use tracing::{info, trace};

use crate::cluster::check_threshold;
use crate::config::ResolverConfig;
use crate::error::Result;
use crate::normalization::Normalizer;
use crate::record::{ClusterAssignment, ClusterId, ClusterIdSequence, NameRecord};
use crate::similarity::Scorer;

/// A distinct representative and the cluster that introduced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepresentativeEntry {
    pub cluster_id: ClusterId,
    pub cluster_rep: String,
    pub normalized_rep: String,
}

/// Append-only arena of representatives with reverse indexes.
#[derive(Debug, Clone, Default)]
pub struct RepresentativeIndex {
    entries: Vec<RepresentativeEntry>,
    by_rep: HashMap<String, usize>,
    by_cluster: HashMap<ClusterId, usize>,
}

impl RepresentativeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the representatives of already-resolved clusters.
    pub fn from_assignments(assignments: &[ClusterAssignment], normalizer: &Normalizer) -> Self {
        let mut index = Self::new();
        for assignment in assignments {
            if index.by_cluster.contains_key(&assignment.cluster_id) {
                continue;
            }
            let normalized = normalizer.normalize(&assignment.cluster_rep);
            index.insert(assignment.cluster_id, &assignment.cluster_rep, normalized);
        }
        index
    }

    /// Register a cluster's representative.
    ///
    /// A representative string already present keeps its first cluster as
    /// the match target; returns `false` in that case.
    pub fn insert(&mut self, cluster_id: ClusterId, rep: &str, normalized_rep: String) -> bool {
        if let Some(&existing) = self.by_rep.get(rep) {
            self.by_cluster.entry(cluster_id).or_insert(existing);
            return false;
        }

        let slot = self.entries.len();
        self.entries.push(RepresentativeEntry {
            cluster_id,
            cluster_rep: rep.to_string(),
            normalized_rep,
        });
        self.by_rep.insert(rep.to_string(), slot);
        self.by_cluster.entry(cluster_id).or_insert(slot);
        true
    }

    /// Number of distinct representatives.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RepresentativeEntry] {
        &self.entries
    }

    /// Representative of a known cluster.
    pub fn representative(&self, cluster_id: ClusterId) -> Option<&str> {
        self.by_cluster
            .get(&cluster_id)
            .map(|&slot| self.entries[slot].cluster_rep.as_str())
    }

    /// Closest entry to a normalized name and its distance; earliest on ties.
    pub fn nearest(&self, normalized: &str, scorer: Scorer) -> Option<(&RepresentativeEntry, f64)> {
        let mut best: Option<(&RepresentativeEntry, f64)> = None;
        for entry in &self.entries {
            let distance = scorer.distance(normalized, &entry.normalized_rep);
            match best {
                Some((_, best_distance)) if best_distance <= distance => {}
                _ => best = Some((entry, distance)),
            }
        }
        best
    }
}

/// Assigns leftover records to existing clusters or new singletons.
#[derive(Debug, Clone)]
pub struct IncrementalAssigner {
    threshold: f64,
    scorer: Scorer,
    normalizer: Normalizer,
}

impl IncrementalAssigner {
    pub fn new(threshold: f64) -> Result<Self> {
        Ok(Self {
            threshold: check_threshold(threshold)?,
            scorer: Scorer::default(),
            normalizer: Normalizer::default(),
        })
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        Ok(Self::new(config.distance_threshold)?
            .with_scorer(config.scorer)
            .with_normalizer(Normalizer::new(config.token_lookup.clone())))
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Normalizer applied to existing representatives; should match the
    /// one that produced the records' normalized names.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Assign each unclustered record against the clusters in `resolved`
    /// and those opened during this pass.
    pub fn assign_unclustered<'a, I>(
        &self,
        unclustered: I,
        resolved: &[ClusterAssignment],
        ids: &mut ClusterIdSequence,
    ) -> Vec<ClusterAssignment>
    where
        I: IntoIterator<Item = &'a NameRecord>,
    {
        let mut index = RepresentativeIndex::from_assignments(resolved, &self.normalizer);
        self.assign_with_index(unclustered, &mut index, ids)
    }

    /// Like [`assign_unclustered`](Self::assign_unclustered) over a
    /// caller-held index, which grows with every cluster opened.
    pub fn assign_with_index<'a, I>(
        &self,
        unclustered: I,
        index: &mut RepresentativeIndex,
        ids: &mut ClusterIdSequence,
    ) -> Vec<ClusterAssignment>
    where
        I: IntoIterator<Item = &'a NameRecord>,
    {
        let mut assignments = Vec::new();
        let mut joined = 0usize;

        for record in unclustered {
            let matched = index
                .nearest(&record.normalized_name, self.scorer)
                .filter(|(_, distance)| *distance <= self.threshold)
                .map(|(entry, distance)| (entry.cluster_id, entry.cluster_rep.clone(), distance));

            match matched {
                Some((cluster_id, cluster_rep, distance)) => {
                    trace!(
                        record = record.index,
                        cluster = %cluster_id,
                        distance,
                        "Joined existing cluster"
                    );
                    joined += 1;
                    assignments.push(ClusterAssignment {
                        record: record.index,
                        cluster_id,
                        cluster_rep,
                    });
                }
                None => {
                    let cluster_id = ids.next_id();
                    trace!(record = record.index, cluster = %cluster_id, "Opened new cluster");
                    index.insert(cluster_id, &record.raw_name, record.normalized_name.clone());
                    assignments.push(ClusterAssignment {
                        record: record.index,
                        cluster_id,
                        cluster_rep: record.raw_name.clone(),
                    });
                }
            }
        }

        info!(
            records = assignments.len(),
            joined,
            opened = assignments.len() - joined,
            "Incremental assignment complete"
        );

        assignments
    }
}

/// Incremental assignment with the default scorer and no token lookup.
pub fn assign_unclustered<'a, I>(
    unclustered: I,
    resolved: &[ClusterAssignment],
    threshold: f64,
    ids: &mut ClusterIdSequence,
) -> Result<Vec<ClusterAssignment>>
where
    I: IntoIterator<Item = &'a NameRecord>,
{
    Ok(IncrementalAssigner::new(threshold)?.assign_unclustered(unclustered, resolved, ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, name: &str) -> NameRecord {
        NameRecord::new(index, name, &Normalizer::default())
    }

    fn assignment(record: usize, id: u64, rep: &str) -> ClusterAssignment {
        ClusterAssignment {
            record,
            cluster_id: ClusterId(id),
            cluster_rep: rep.to_string(),
        }
    }

    #[test]
    fn test_joins_matching_cluster_without_changing_rep() {
        let resolved = vec![assignment(0, 1, "Jan de Vries"), assignment(1, 1, "Jan de Vries")];
        let leftovers = vec![record(2, "Jan Pieter de Vries")];
        let mut ids = ClusterIdSequence::starting_at(2);

        let out = assign_unclustered(&leftovers, &resolved, 0.15, &mut ids).unwrap();
        assert_eq!(out, vec![assignment(2, 1, "Jan de Vries")]);
        assert_eq!(ids.peek(), ClusterId(2));
    }

    #[test]
    fn test_opens_new_cluster_when_nothing_matches() {
        let resolved = vec![assignment(0, 1, "Paris")];
        let leftovers = vec![record(1, "Berlin")];
        let mut ids = ClusterIdSequence::starting_at(2);

        let out = assign_unclustered(&leftovers, &resolved, 0.2, &mut ids).unwrap();
        assert_eq!(out, vec![assignment(1, 2, "Berlin")]);
        assert_eq!(ids.peek(), ClusterId(3));
    }

    #[test]
    fn test_later_records_join_clusters_opened_in_same_pass() {
        let leftovers = vec![record(0, "Amsterdam"), record(1, "Amsterdam"), record(2, "Utrecht")];
        let mut ids = ClusterIdSequence::new();

        let out = assign_unclustered(&leftovers, &[], 0.15, &mut ids).unwrap();
        assert_eq!(
            out,
            vec![
                assignment(0, 1, "Amsterdam"),
                assignment(1, 1, "Amsterdam"),
                assignment(2, 2, "Utrecht"),
            ]
        );
    }

    #[test]
    fn test_duplicate_rep_strings_target_first_cluster() {
        let resolved = vec![assignment(0, 1, "Jan de Vries"), assignment(1, 2, "Jan de Vries")];
        let index = RepresentativeIndex::from_assignments(&resolved, &Normalizer::default());
        assert_eq!(index.len(), 1);
        assert_eq!(index.representative(ClusterId(2)), Some("Jan de Vries"));

        let leftovers = vec![record(2, "Jan de Vries")];
        let mut ids = ClusterIdSequence::starting_at(3);
        let out = assign_unclustered(&leftovers, &resolved, 0.15, &mut ids).unwrap();
        assert_eq!(out[0].cluster_id, ClusterId(1));
    }

    #[test]
    fn test_nearest_prefers_earliest_on_tie() {
        let mut index = RepresentativeIndex::new();
        index.insert(ClusterId(1), "Paris", "paris".to_string());
        index.insert(ClusterId(2), "PARIS!", "paris".to_string());
        let (entry, distance) = index.nearest("paris", Scorer::PartialRatio).unwrap();
        assert_eq!(entry.cluster_id, ClusterId(1));
        assert_eq!(distance, 0.0);
    }

    #[test]
    fn test_empty_index_has_no_nearest() {
        let index = RepresentativeIndex::new();
        assert!(index.nearest("paris", Scorer::PartialRatio).is_none());
    }
}
