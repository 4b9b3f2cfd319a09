//! Two-phase resolution orchestration
//!
//! Partitioned clustering runs first; records it sets aside are then
//! assigned incrementally against the clusters it produced. One
//! `ClusterIdSequence` is threaded through both phases.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ResolverConfig;
use crate::error::Result;
use crate::incremental::IncrementalAssigner;
use crate::normalization::Normalizer;
use crate::partition::{GroupLinkage, PartitionedResolver};
use crate::record::{ClusterAssignment, ClusterId, ClusterIdSequence, NameRecord};

/// One row of the mention table: column name to optional value.
pub type Row = BTreeMap<String, Option<String>>;

/// Counts describing one resolution run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub records: usize,
    pub groups: usize,
    pub partitioned: usize,
    pub unpartitioned: usize,
    pub clusters: usize,
    /// Unpartitioned records that joined an existing cluster
    pub joined_existing: usize,
    /// Unpartitioned records that opened a new cluster
    pub opened_new: usize,
}

/// Output of a full run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// Partitioned assignments (group by group) then incremental ones
    pub assignments: Vec<ClusterAssignment>,
    pub stats: ResolutionStats,
    pub linkages: Vec<GroupLinkage>,
}

impl Resolution {
    /// Assignment of the record with `NameRecord::index == record`.
    ///
    /// Scans the assignments; build [`by_record`](Self::by_record) once for
    /// repeated lookups.
    pub fn assignment_for(&self, record: usize) -> Option<&ClusterAssignment> {
        self.assignments.iter().find(|a| a.record == record)
    }

    /// Assignments keyed by `NameRecord::index`.
    pub fn by_record(&self) -> HashMap<usize, &ClusterAssignment> {
        self.assignments.iter().map(|a| (a.record, a)).collect()
    }

    /// Record indexes per cluster.
    pub fn clusters(&self) -> BTreeMap<ClusterId, Vec<usize>> {
        let mut clusters: BTreeMap<ClusterId, Vec<usize>> = BTreeMap::new();
        for assignment in &self.assignments {
            clusters
                .entry(assignment.cluster_id)
                .or_default()
                .push(assignment.record);
        }
        clusters
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters().len()
    }
}

/// Resolver configured once and applied to whole tables.
#[derive(Debug, Clone)]
pub struct Resolver {
    config: ResolverConfig,
    normalizer: Normalizer,
    partitioned: PartitionedResolver,
    incremental: IncrementalAssigner,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            normalizer: Normalizer::new(config.token_lookup.clone()),
            partitioned: PartitionedResolver::from_config(&config)?,
            incremental: IncrementalAssigner::from_config(&config)?,
            config,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Build a record from a raw name and its attribute values.
    pub fn record<'a, I>(&self, index: usize, raw_name: &str, attributes: I) -> NameRecord
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        attributes
            .into_iter()
            .fold(NameRecord::new(index, raw_name, &self.normalizer), |record, (column, value)| {
                record.with_attribute(column, value)
            })
    }

    /// Build one record per row; a row without a name value gets an empty
    /// name. Every other column is carried as an attribute.
    pub fn records_from_rows(&self, rows: &[Row]) -> Vec<NameRecord> {
        let name_column = self.config.name_column.as_str();
        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                let raw_name = row
                    .get(name_column)
                    .and_then(|v| v.as_deref())
                    .unwrap_or_default();
                self.record(
                    index,
                    raw_name,
                    row.iter()
                        .filter(|(column, _)| column.as_str() != name_column)
                        .map(|(column, value)| (column.as_str(), value.as_deref())),
                )
            })
            .collect()
    }

    /// Resolve records: partitioned phase, then incremental phase.
    pub fn resolve(&self, records: &[NameRecord]) -> Result<Resolution> {
        let mut ids = ClusterIdSequence::new();
        self.resolve_with_ids(records, &mut ids)
    }

    /// Resolve drawing ids from a caller-held sequence.
    pub fn resolve_with_ids(
        &self,
        records: &[NameRecord],
        ids: &mut ClusterIdSequence,
    ) -> Result<Resolution> {
        let outcome = self
            .partitioned
            .resolve(records, &self.config.filter_columns, ids)?;

        let before_incremental = ids.peek();
        let incremental =
            self.incremental
                .assign_unclustered(outcome.unpartitioned.iter().copied(), &outcome.assignments, ids);
        let opened_new = (ids.peek().0 - before_incremental.0) as usize;

        let mut resolution = Resolution {
            stats: ResolutionStats {
                records: records.len(),
                groups: outcome.groups,
                partitioned: outcome.assignments.len(),
                unpartitioned: outcome.unpartitioned.len(),
                clusters: 0,
                joined_existing: incremental.len() - opened_new,
                opened_new,
            },
            assignments: outcome.assignments,
            linkages: outcome.linkages,
        };
        resolution.assignments.extend(incremental);
        resolution.stats.clusters = resolution.cluster_count();

        info!(
            records = resolution.stats.records,
            clusters = resolution.stats.clusters,
            groups = resolution.stats.groups,
            unpartitioned = resolution.stats.unpartitioned,
            "Resolution complete"
        );

        Ok(resolution)
    }

    /// Build records from rows and resolve them.
    pub fn resolve_rows(&self, rows: &[Row]) -> Result<Resolution> {
        let records = self.records_from_rows(rows);
        self.resolve(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Option<&str>)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(|s| s.to_string())))
            .collect()
    }

    #[test]
    fn test_records_from_rows() {
        let resolver = Resolver::new(ResolverConfig::default().with_name_column("label")).unwrap();
        let rows = vec![
            row(&[("label", Some("Émile Zola")), ("nationality", Some("French"))]),
            row(&[("nationality", None)]),
        ];
        let records = resolver.records_from_rows(&rows);

        assert_eq!(records[0].normalized_name, "emile zola");
        assert_eq!(records[0].attribute("nationality"), Some("French"));
        assert!(!records[0].attributes.contains_key("label"));
        assert_eq!(records[1].raw_name, "");
        assert_eq!(records[1].index, 1);
    }

    #[test]
    fn test_stats() {
        let config = ResolverConfig::default().with_filter_columns(["nationality"]);
        let resolver = Resolver::new(config).unwrap();
        let rows = vec![
            row(&[("name", Some("Jan de Vries")), ("nationality", Some("Dutch"))]),
            row(&[("name", Some("J. de Vries")), ("nationality", Some("Dutch"))]),
            row(&[("name", Some("Jan de Vries")), ("nationality", None)]),
            row(&[("name", Some("Paris")), ("nationality", None)]),
        ];
        let resolution = resolver.resolve_rows(&rows).unwrap();

        assert_eq!(
            resolution.stats,
            ResolutionStats {
                records: 4,
                groups: 1,
                partitioned: 2,
                unpartitioned: 2,
                clusters: 2,
                joined_existing: 1,
                opened_new: 1,
            }
        );
    }

    #[test]
    fn test_by_record_matches_assignment_for() {
        let resolver = Resolver::new(ResolverConfig::default()).unwrap();
        let rows = vec![
            row(&[("name", Some("Paris"))]),
            row(&[("name", Some("Berlin"))]),
            row(&[("name", Some("Paris"))]),
        ];
        let resolution = resolver.resolve_rows(&rows).unwrap();
        let index = resolution.by_record();

        assert_eq!(index.len(), 3);
        for record in 0..3 {
            assert_eq!(index.get(&record).copied(), resolution.assignment_for(record));
        }
        assert_eq!(index[&0].cluster_id, index[&2].cluster_id);
        assert!(resolution.assignment_for(3).is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Resolver::new(ResolverConfig::default().with_threshold(f64::INFINITY)).is_err());
    }
}
