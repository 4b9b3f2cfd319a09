//! impress-resolve - CSV adapter
//!
//! Reads a mention table, resolves the name column and writes the table
//! back with `cluster_id` and `cluster_rep` columns appended. Partitioned
//! rows come first, group by group, followed by incrementally assigned rows.
//!
//! # Usage
//!
//! ```bash
//! impress-resolve mentions.csv -o resolved.csv --filter-column nationality
//! impress-resolve mentions.csv --config resolve.toml --threshold 0.2 --report
//! impress-resolve mentions.csv --report --check-column occupation --list-column occupation
//! RUST_LOG=impress_resolve=debug impress-resolve mentions.csv
//! ```

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::info;

use impress_resolve::{
    validate_clusters, AttributeCheck, RepresentativeStrategy, ResolveError, Resolver,
    ResolverConfig, Row, Scorer, DEFAULT_LIST_SEPARATOR,
};

/// Cluster entity mentions in a CSV table by fuzzy name similarity
#[derive(Debug, Parser)]
#[command(name = "impress-resolve", version, about)]
struct Args {
    /// Input CSV with a header row
    input: PathBuf,

    /// Output CSV (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Column holding the mention name
    #[arg(long)]
    name_column: Option<String>,

    /// Attribute column that must match before names are compared (repeatable)
    #[arg(short, long = "filter-column")]
    filter_columns: Vec<String>,

    /// Maximum linkage distance for a merge, in [0, 1]
    #[arg(short, long)]
    threshold: Option<f64>,

    #[arg(long, value_enum)]
    scorer: Option<ScorerArg>,

    #[arg(long, value_enum)]
    representative: Option<RepresentativeArg>,

    /// Print run statistics and attribute conflicts as JSON on stderr
    #[arg(long)]
    report: bool,

    /// Attribute checked for disagreement within clusters by `--report`
    /// (repeatable; every non-name column when omitted)
    #[arg(long = "check-column")]
    check_columns: Vec<String>,

    /// Checked attribute holding several values per cell; conflicts only
    /// when the members share no value (repeatable)
    #[arg(long = "list-column")]
    list_columns: Vec<String>,

    /// Separator between values of a list column
    #[arg(long, default_value_t = DEFAULT_LIST_SEPARATOR)]
    list_separator: char,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScorerArg {
    PartialRatio,
    Ratio,
    TokenSortRatio,
    JaroWinkler,
    Levenshtein,
}

impl From<ScorerArg> for Scorer {
    fn from(arg: ScorerArg) -> Self {
        match arg {
            ScorerArg::PartialRatio => Scorer::PartialRatio,
            ScorerArg::Ratio => Scorer::Ratio,
            ScorerArg::TokenSortRatio => Scorer::TokenSortRatio,
            ScorerArg::JaroWinkler => Scorer::JaroWinkler,
            ScorerArg::Levenshtein => Scorer::NormalizedLevenshtein,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RepresentativeArg {
    Longest,
    MostFrequent,
}

impl From<RepresentativeArg> for RepresentativeStrategy {
    fn from(arg: RepresentativeArg) -> Self {
        match arg {
            RepresentativeArg::Longest => RepresentativeStrategy::Longest,
            RepresentativeArg::MostFrequent => RepresentativeStrategy::MostFrequent,
        }
    }
}

impl Args {
    fn resolver_config(&self) -> Result<ResolverConfig, ResolveError> {
        let mut config = match &self.config {
            Some(path) => ResolverConfig::load(path)?,
            None => ResolverConfig::default(),
        };
        if let Some(column) = &self.name_column {
            config = config.with_name_column(column.clone());
        }
        if !self.filter_columns.is_empty() {
            config = config.with_filter_columns(self.filter_columns.iter().cloned());
        }
        if let Some(threshold) = self.threshold {
            config = config.with_threshold(threshold);
        }
        if let Some(scorer) = self.scorer {
            config = config.with_scorer(scorer.into());
        }
        if let Some(strategy) = self.representative {
            config = config.with_representative(strategy.into());
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays a clean CSV stream
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = args.resolver_config()?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(&args.input)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    for column in std::iter::once(&config.name_column).chain(&config.filter_columns) {
        if !headers.contains(column) {
            return Err(ResolveError::MissingColumn(column.clone()).into());
        }
    }

    let mut table: Vec<Vec<String>> = Vec::new();
    for result in reader.records() {
        let record = result?;
        table.push(record.iter().map(str::to_string).collect());
    }
    info!(rows = table.len(), input = %args.input.display(), "Loaded mention table");

    let rows: Vec<Row> = table
        .iter()
        .map(|values| {
            headers
                .iter()
                .zip(values)
                .map(|(column, value)| (column.clone(), Some(value.clone())))
                .collect()
        })
        .collect();

    let resolver = Resolver::new(config)?;
    let records = resolver.records_from_rows(&rows);
    let resolution = resolver.resolve(&records)?;

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = csv::Writer::from_writer(sink);

    let mut header_row = headers.clone();
    header_row.push("cluster_id".to_string());
    header_row.push("cluster_rep".to_string());
    writer.write_record(&header_row)?;

    for assignment in &resolution.assignments {
        let mut out = table[assignment.record].clone();
        out.push(assignment.cluster_id.to_string());
        out.push(assignment.cluster_rep.clone());
        writer.write_record(&out)?;
    }
    writer.flush()?;

    if args.report {
        let checked: Vec<&String> = if args.check_columns.is_empty() {
            headers
                .iter()
                .filter(|column| **column != resolver.config().name_column)
                .collect()
        } else {
            args.check_columns.iter().collect()
        };
        let checks: Vec<AttributeCheck> = checked
            .into_iter()
            .map(|column| {
                if args.list_columns.contains(column) {
                    AttributeCheck::list(column.clone(), args.list_separator)
                } else {
                    AttributeCheck::scalar(column.clone())
                }
            })
            .collect();
        let conflicts = validate_clusters(&records, &resolution.assignments, &checks);
        let report = serde_json::json!({
            "stats": resolution.stats,
            "conflicts": conflicts,
        });
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
