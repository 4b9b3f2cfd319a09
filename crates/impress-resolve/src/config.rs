//! Resolver configuration
//!
//! Loaded from TOML with every field optional:
//!
//! ```toml
//! distance_threshold = 0.15
//! name_column = "canonical_name"
//! filter_columns = ["nationality"]
//! scorer = "partial_ratio"
//! representative = "longest"
//! keep_linkage = false
//!
//! [token_lookup]
//! van = ""
//! "van den" = ""
//! koning = "king"
//! ```
//!
//! An empty `filter_columns` list puts every record into one partition
//! group; nothing is routed to incremental assignment.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cluster::check_threshold;
use crate::error::{ResolveError, Result};
use crate::normalization::TokenLookup;
use crate::representative::RepresentativeStrategy;
use crate::similarity::Scorer;

/// Default maximum merge distance (about 85 similarity).
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 0.15;

/// Default name column of the mention table.
pub const DEFAULT_NAME_COLUMN: &str = "name";

/// Options recognized by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum linkage distance for two mentions to share a cluster
    pub distance_threshold: f64,
    /// Attribute columns that must match before names are compared
    pub filter_columns: Vec<String>,
    /// Column holding the mention name
    pub name_column: String,
    /// Token substitutions applied during normalization
    pub token_lookup: TokenLookup,
    pub scorer: Scorer,
    pub representative: RepresentativeStrategy,
    /// Retain per-group dendrograms in the resolution output
    pub keep_linkage: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            filter_columns: Vec::new(),
            name_column: DEFAULT_NAME_COLUMN.to_string(),
            token_lookup: TokenLookup::default(),
            scorer: Scorer::default(),
            representative: RepresentativeStrategy::default(),
            keep_linkage: false,
        }
    }
}

impl ResolverConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ResolverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject unusable thresholds and token lookups whose replacements
    /// contain other keys.
    pub fn validate(&self) -> Result<()> {
        check_threshold(self.distance_threshold)?;
        if let Some(key) = self.token_lookup.chained_key() {
            return Err(ResolveError::Config(format!(
                "token_lookup replacement contains the key {:?}; substitution is a single pass",
                key
            )));
        }
        Ok(())
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = threshold;
        self
    }

    pub fn with_filter_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_name_column(mut self, column: impl Into<String>) -> Self {
        self.name_column = column.into();
        self
    }

    pub fn with_token_lookup(mut self, lookup: TokenLookup) -> Self {
        self.token_lookup = lookup;
        self
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.distance_threshold, 0.15);
        assert_eq!(config.name_column, "name");
        assert!(config.filter_columns.is_empty());
        assert_eq!(config.scorer, Scorer::PartialRatio);
        assert_eq!(config.representative, RepresentativeStrategy::Longest);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = ResolverConfig::from_toml_str("").unwrap();
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn test_full_toml() {
        let config = ResolverConfig::from_toml_str(
            r#"
            distance_threshold = 0.2
            name_column = "canonical_name"
            filter_columns = ["nationality", "type"]
            scorer = "token_sort_ratio"
            representative = "most_frequent"
            keep_linkage = true

            [token_lookup]
            "Van Den" = ""
            koning = "King"
            "#,
        )
        .unwrap();

        assert_eq!(config.distance_threshold, 0.2);
        assert_eq!(config.name_column, "canonical_name");
        assert_eq!(config.filter_columns, vec!["nationality", "type"]);
        assert_eq!(config.scorer, Scorer::TokenSortRatio);
        assert_eq!(config.representative, RepresentativeStrategy::MostFrequent);
        assert!(config.keep_linkage);
        assert_eq!(config.token_lookup.get("van den"), Some(""));
        assert_eq!(config.token_lookup.get("koning"), Some("king"));
    }

    #[test]
    fn test_rejects_negative_threshold() {
        assert_eq!(
            ResolverConfig::from_toml_str("distance_threshold = -1.0"),
            Err(ResolveError::InvalidThreshold(-1.0))
        );
    }

    #[test]
    fn test_rejects_bad_toml() {
        assert!(matches!(
            ResolverConfig::from_toml_str("distance_threshold = \"high\""),
            Err(ResolveError::Config(_))
        ));
    }

    #[test]
    fn test_builder() {
        let config = ResolverConfig::default()
            .with_threshold(0.3)
            .with_filter_columns(["nationality"])
            .with_name_column("label");
        assert_eq!(config.distance_threshold, 0.3);
        assert_eq!(config.filter_columns, vec!["nationality".to_string()]);
        assert_eq!(config.name_column, "label");
    }

    #[test]
    fn test_rejects_chained_token_lookup() {
        let result = ResolverConfig::from_toml_str(
            r#"
            [token_lookup]
            koning = "king"
            king = "rex"
            "#,
        );
        assert!(matches!(result, Err(ResolveError::Config(message)) if message.contains("king")));
    }
}
