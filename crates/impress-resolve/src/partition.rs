//! Attribute-partitioned resolution
//!
//! Records are grouped by the tuple of their filter-column values and each
//! group is clustered on its own. Records missing any filter value are set
//! aside for incremental assignment. Groups run in sorted key order and
//! draw consecutive id ranges from the shared sequence, so ids never
//! collide between groups.
//!
//! # Parallel Processing
//!
//! When the `parallel` feature is enabled, the per-group distance matrices
//! and dendrograms are computed with rayon. Ids are still allocated
//! afterwards in key order, so the output is identical to the sequential
//! build.

use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cluster::{HierarchicalClusterer, Linkage};
use crate::config::ResolverConfig;
use crate::error::{ResolveError, Result};
use crate::record::{ClusterAssignment, ClusterId, ClusterIdSequence, NameRecord};
use crate::representative::RepresentativeStrategy;
use crate::similarity::Scorer;

/// Dendrogram of one partition group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupLinkage {
    /// Filter-column values shared by the group
    pub key: Vec<String>,
    /// `NameRecord::index` of each leaf, in leaf order
    pub records: Vec<usize>,
    pub linkage: Linkage,
}

/// Result of the partitioned phase.
#[derive(Debug, Clone, Default)]
pub struct PartitionOutcome<'a> {
    /// Assignments for every partitioned record, group by group
    pub assignments: Vec<ClusterAssignment>,
    /// Records missing a filter value, in input order
    pub unpartitioned: Vec<&'a NameRecord>,
    /// Number of partition groups
    pub groups: usize,
    /// Dendrograms, when requested
    pub linkages: Vec<GroupLinkage>,
}

/// Clusters records within attribute-homogeneous groups.
#[derive(Debug, Clone)]
pub struct PartitionedResolver {
    clusterer: HierarchicalClusterer,
    scorer: Scorer,
    representative: RepresentativeStrategy,
    keep_linkage: bool,
}

impl PartitionedResolver {
    pub fn new(threshold: f64) -> Result<Self> {
        Ok(Self {
            clusterer: HierarchicalClusterer::new(threshold)?,
            scorer: Scorer::default(),
            representative: RepresentativeStrategy::default(),
            keep_linkage: false,
        })
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        Ok(Self::new(config.distance_threshold)?
            .with_scorer(config.scorer)
            .with_representative(config.representative)
            .keep_linkage(config.keep_linkage))
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_representative(mut self, strategy: RepresentativeStrategy) -> Self {
        self.representative = strategy;
        self
    }

    pub fn keep_linkage(mut self, keep: bool) -> Self {
        self.keep_linkage = keep;
        self
    }

    /// Resolve every record that has a value in each of `filter_columns`.
    ///
    /// With no filter columns all records form a single group.
    pub fn resolve<'a>(
        &self,
        records: &'a [NameRecord],
        filter_columns: &[String],
        ids: &mut ClusterIdSequence,
    ) -> Result<PartitionOutcome<'a>> {
        let mut grouped: BTreeMap<Vec<String>, Vec<&'a NameRecord>> = BTreeMap::new();
        let mut unpartitioned = Vec::new();
        for record in records {
            match record.partition_key(filter_columns) {
                Some(key) => grouped.entry(key).or_default().push(record),
                None => unpartitioned.push(record),
            }
        }
        let groups: Vec<(Vec<String>, Vec<&'a NameRecord>)> = grouped.into_iter().collect();

        #[cfg(feature = "parallel")]
        let clustered: Vec<(Vec<usize>, Option<Linkage>)> = groups
            .par_iter()
            .map(|(_, members)| self.cluster_group(members))
            .collect::<Result<Vec<_>>>()?;

        #[cfg(not(feature = "parallel"))]
        let clustered: Vec<(Vec<usize>, Option<Linkage>)> = groups
            .iter()
            .map(|(_, members)| self.cluster_group(members))
            .collect::<Result<Vec<_>>>()?;

        let mut outcome = PartitionOutcome {
            assignments: Vec::with_capacity(records.len() - unpartitioned.len()),
            unpartitioned,
            groups: groups.len(),
            linkages: Vec::new(),
        };

        for ((key, members), (labels, linkage)) in groups.into_iter().zip(clustered) {
            let cluster_count = labels.iter().max().map_or(0, |max| max + 1);
            let first = ids.reserve(cluster_count);

            let mut names_by_label: Vec<Vec<&str>> = vec![Vec::new(); cluster_count];
            for (member, &label) in members.iter().zip(&labels) {
                names_by_label[label].push(member.raw_name.as_str());
            }
            let reps: Vec<String> = names_by_label
                .iter()
                .map(|names| self.representative.pick(names).unwrap_or_default().to_string())
                .collect();

            debug!(
                key = ?key,
                size = members.len(),
                clusters = cluster_count,
                first_id = %first,
                "Clustered partition group"
            );

            for (member, &label) in members.iter().zip(&labels) {
                outcome.assignments.push(ClusterAssignment {
                    record: member.index,
                    cluster_id: ClusterId(first.0 + label as u64),
                    cluster_rep: reps[label].clone(),
                });
            }

            if let Some(linkage) = linkage.filter(|_| self.keep_linkage) {
                outcome.linkages.push(GroupLinkage {
                    key,
                    records: members.iter().map(|m| m.index).collect(),
                    linkage,
                });
            }
        }

        info!(
            groups = outcome.groups,
            partitioned = outcome.assignments.len(),
            unpartitioned = outcome.unpartitioned.len(),
            "Partitioned resolution complete"
        );

        Ok(outcome)
    }

    /// Local labels (and dendrogram) for one group.
    fn cluster_group(&self, members: &[&NameRecord]) -> Result<(Vec<usize>, Option<Linkage>)> {
        if members.len() == 1 {
            return Ok((vec![0], None));
        }

        let names: Vec<&str> = members.iter().map(|r| r.normalized_name.as_str()).collect();
        let matrix = self.scorer.distance_matrix(&names);
        if matrix.len() != members.len() {
            return Err(ResolveError::DimensionMismatch {
                expected: members.len(),
                actual: matrix.len(),
            });
        }

        let (labels, linkage) = self.clusterer.cluster_with_linkage(&matrix)?;
        if labels.len() != members.len() {
            return Err(ResolveError::DimensionMismatch {
                expected: members.len(),
                actual: labels.len(),
            });
        }
        Ok((labels, linkage))
    }
}

/// Partitioned resolution with the default scorer and representative rule.
pub fn resolve_partitioned<'a>(
    records: &'a [NameRecord],
    filter_columns: &[String],
    threshold: f64,
    ids: &mut ClusterIdSequence,
) -> Result<PartitionOutcome<'a>> {
    PartitionedResolver::new(threshold)?.resolve(records, filter_columns, ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::Normalizer;

    fn record(index: usize, name: &str, nationality: Option<&str>) -> NameRecord {
        NameRecord::new(index, name, &Normalizer::default())
            .with_attribute("nationality", nationality)
    }

    fn columns() -> Vec<String> {
        vec!["nationality".to_string()]
    }

    #[test]
    fn test_groups_get_disjoint_ids() {
        let records = vec![
            record(0, "Jan de Vries", Some("Dutch")),
            record(1, "Jan de Vries", Some("German")),
            record(2, "J. de Vries", Some("Dutch")),
        ];
        let mut ids = ClusterIdSequence::new();
        let outcome = resolve_partitioned(&records, &columns(), 0.15, &mut ids).unwrap();

        assert_eq!(outcome.groups, 2);
        assert!(outcome.unpartitioned.is_empty());
        assert_eq!(outcome.assignments.len(), 3);

        // "Dutch" sorts before "German"
        let dutch: Vec<_> = outcome.assignments.iter().filter(|a| a.record != 1).collect();
        let german = outcome.assignments.iter().find(|a| a.record == 1).unwrap();
        assert_eq!(dutch[0].cluster_id, ClusterId(1));
        assert_eq!(dutch[1].cluster_id, ClusterId(1));
        assert_eq!(german.cluster_id, ClusterId(2));
        assert_eq!(ids.peek(), ClusterId(3));
    }

    #[test]
    fn test_missing_attribute_is_set_aside() {
        let records = vec![
            record(0, "Paris", Some("French")),
            record(1, "Berlin", None),
            record(2, "Rome", Some("")),
        ];
        let mut ids = ClusterIdSequence::new();
        let outcome = resolve_partitioned(&records, &columns(), 0.15, &mut ids).unwrap();

        assert_eq!(outcome.assignments.len(), 1);
        let aside: Vec<usize> = outcome.unpartitioned.iter().map(|r| r.index).collect();
        assert_eq!(aside, vec![1, 2]);
    }

    #[test]
    fn test_no_filter_columns_is_one_group() {
        let records = vec![
            record(0, "Hitler", None),
            record(1, "A. Hitler", None),
            record(2, "Adolf Hitler", None),
        ];
        let mut ids = ClusterIdSequence::new();
        let outcome = resolve_partitioned(&records, &[], 0.2, &mut ids).unwrap();

        assert_eq!(outcome.groups, 1);
        assert!(outcome.unpartitioned.is_empty());
        for assignment in &outcome.assignments {
            assert_eq!(assignment.cluster_id, ClusterId(1));
            assert_eq!(assignment.cluster_rep, "Adolf Hitler");
        }
    }

    #[test]
    fn test_singleton_group() {
        let records = vec![record(7, "Paris", Some("French"))];
        let mut ids = ClusterIdSequence::starting_at(10);
        let outcome = resolve_partitioned(&records, &columns(), 0.15, &mut ids).unwrap();

        assert_eq!(
            outcome.assignments,
            vec![ClusterAssignment {
                record: 7,
                cluster_id: ClusterId(10),
                cluster_rep: "Paris".to_string(),
            }]
        );
    }

    #[test]
    fn test_keep_linkage() {
        let records = vec![
            record(0, "Paris", Some("French")),
            record(1, "Paris", Some("French")),
            record(2, "Lyon", Some("French")),
            record(3, "Berlin", Some("German")),
        ];
        let resolver = PartitionedResolver::new(0.15).unwrap().keep_linkage(true);
        let mut ids = ClusterIdSequence::new();
        let outcome = resolver.resolve(&records, &columns(), &mut ids).unwrap();

        // singleton groups carry no dendrogram
        assert_eq!(outcome.linkages.len(), 1);
        assert_eq!(outcome.linkages[0].key, vec!["French".to_string()]);
        assert_eq!(outcome.linkages[0].records, vec![0, 1, 2]);
        assert_eq!(outcome.linkages[0].linkage.merges().len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let mut ids = ClusterIdSequence::new();
        let outcome = resolve_partitioned(&[], &columns(), 0.15, &mut ids).unwrap();
        assert_eq!(outcome.groups, 0);
        assert!(outcome.assignments.is_empty());
        assert_eq!(ids.peek(), ClusterId(1));
    }
}
