//! impress-resolve - Entity mention resolution
//!
//! Groups name strings that refer to the same real-world entity and gives
//! every mention a cluster id and a representative name:
//!
//! - **Normalization**: diacritic folding, case folding, punctuation
//!   collapsing and optional token substitution
//! - **Similarity**: fuzzy partial-ratio scoring turned into a condensed
//!   pairwise distance matrix
//! - **Clustering**: average-linkage agglomerative clustering cut at a
//!   distance threshold
//! - **Partitioning**: records sharing the values of chosen attribute
//!   columns are clustered together; others are assigned incrementally
//!
//! # Example
//!
//! ```
//! use impress_resolve::{Resolver, ResolverConfig};
//!
//! let resolver = Resolver::new(ResolverConfig::default().with_threshold(0.2)).unwrap();
//! let normalizer = resolver.normalizer().clone();
//! let records: Vec<_> = ["Hitler", "A. Hitler", "Adolf Hitler"]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, name)| impress_resolve::NameRecord::new(i, *name, &normalizer))
//!     .collect();
//!
//! let resolution = resolver.resolve(&records).unwrap();
//! assert_eq!(resolution.cluster_count(), 1);
//! assert_eq!(resolution.assignments[0].cluster_rep, "Adolf Hitler");
//! ```
//!
//! # Features
//!
//! - `parallel`: cluster partition groups concurrently with rayon
//! - `cli`: build the `impress-resolve` CSV command-line adapter

pub mod cluster;
pub mod config;
pub mod error;
pub mod incremental;
pub mod normalization;
pub mod partition;
pub mod pipeline;
pub mod record;
pub mod representative;
pub mod similarity;
pub mod validation;

pub use cluster::{cluster, HierarchicalClusterer, Linkage, Merge};
pub use config::{ResolverConfig, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_NAME_COLUMN};
pub use error::{ResolveError, Result};
pub use incremental::{
    assign_unclustered, IncrementalAssigner, RepresentativeEntry, RepresentativeIndex,
};
pub use normalization::{normalize, Normalizer, TokenLookup};
pub use partition::{resolve_partitioned, GroupLinkage, PartitionOutcome, PartitionedResolver};
pub use pipeline::{Resolution, ResolutionStats, Resolver, Row};
pub use record::{ClusterAssignment, ClusterId, ClusterIdSequence, NameRecord};
pub use representative::{pick_representative, RepresentativeStrategy};
pub use similarity::{
    pairwise_distance_matrix, partial_ratio, ratio, similarity, token_sort_ratio, DistanceMatrix,
    Scorer,
};
pub use validation::{
    find_attribute_conflicts, validate_clusters, AttributeCheck, AttributeConflict, AttributeKind,
    DEFAULT_LIST_SEPARATOR,
};
