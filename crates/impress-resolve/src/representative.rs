//! Canonical representative selection

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How the canonical string of a cluster is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepresentativeStrategy {
    /// Longest name (in characters); ties go to the earliest
    #[default]
    Longest,
    /// Most frequent name; ties go to the longer, then the earliest
    MostFrequent,
}

impl RepresentativeStrategy {
    /// Pick one name from a cluster's members in input order.
    pub fn pick<'a, S: AsRef<str>>(self, names: &'a [S]) -> Option<&'a str> {
        match self {
            RepresentativeStrategy::Longest => pick_representative(names),
            RepresentativeStrategy::MostFrequent => pick_most_frequent(names),
        }
    }
}

/// The longest name, earliest on ties. `None` for an empty cluster.
pub fn pick_representative<S: AsRef<str>>(names: &[S]) -> Option<&str> {
    let mut best: Option<(&str, usize)> = None;
    for name in names {
        let name = name.as_ref();
        let len = name.chars().count();
        match best {
            Some((_, best_len)) if best_len >= len => {}
            _ => best = Some((name, len)),
        }
    }
    best.map(|(name, _)| name)
}

fn pick_most_frequent<S: AsRef<str>>(names: &[S]) -> Option<&str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in names {
        *counts.entry(name.as_ref()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize, usize)> = None;
    for name in names {
        let name = name.as_ref();
        let count = counts[name];
        let len = name.chars().count();
        let better = match best {
            None => true,
            Some((_, best_count, best_len)) => (count, len) > (best_count, best_len),
        };
        if better {
            best = Some((name, count, len));
        }
    }
    best.map(|(name, _, _)| name)
}
