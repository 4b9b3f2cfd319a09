//! Name normalization for comparison
//!
//! - Converts to lowercase
//! - Removes diacritics (NFKD, combining marks dropped)
//! - Turns runs of whitespace and punctuation into a single space
//! - Applies an optional token substitution table

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Token substitutions applied to an already-normalized name.
///
/// Keys are normalized on insert and may span several tokens (`"van den"`);
/// the longest matching phrase wins. An empty replacement removes the
/// matched tokens, which is how name particles are stripped.
///
/// Substitution is a single left-to-right pass: replacement text is never
/// matched again. A lookup whose replacements contain keys (`koning -> king`,
/// `king -> rex`) would make normalization non-idempotent;
/// [`chained_key`](Self::chained_key) detects it and config validation
/// rejects it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, String>", into = "HashMap<String, String>")]
pub struct TokenLookup {
    entries: HashMap<String, String>,
    max_phrase_len: usize,
}

impl TokenLookup {
    /// Create an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a substitution. Keys that normalize to nothing are ignored.
    pub fn insert(&mut self, from: &str, to: &str) {
        let key = normalize(from, None);
        if key.is_empty() {
            return;
        }
        let phrase_len = key.split(' ').count();
        self.max_phrase_len = self.max_phrase_len.max(phrase_len);
        self.entries.insert(key, normalize(to, None));
    }

    /// Look up the replacement for a normalized token or phrase.
    pub fn get(&self, phrase: &str) -> Option<&str> {
        self.entries.get(phrase).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A key that also appears as a token or phrase inside some
    /// replacement, if any. The smallest such key is returned.
    pub fn chained_key(&self) -> Option<&str> {
        self.entries
            .values()
            .flat_map(|replacement| {
                let tokens: Vec<&str> = replacement.split(' ').filter(|t| !t.is_empty()).collect();
                let mut hits = Vec::new();
                for start in 0..tokens.len() {
                    for end in start + 1..=tokens.len().min(start + self.max_phrase_len) {
                        let phrase = tokens[start..end].join(" ");
                        if let Some((key, _)) = self.entries.get_key_value(&phrase) {
                            hits.push(key.as_str());
                        }
                    }
                }
                hits
            })
            .min()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace whole tokens of a normalized string, longest phrase first.
    fn substitute(&self, normalized: &str) -> String {
        let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
        let mut out: Vec<&str> = Vec::with_capacity(tokens.len());

        let mut i = 0;
        while i < tokens.len() {
            let longest = self.max_phrase_len.min(tokens.len() - i);
            let hit = (1..=longest).rev().find_map(|len| {
                let phrase = tokens[i..i + len].join(" ");
                self.entries
                    .get(&phrase)
                    .map(|replacement| (len, replacement.as_str()))
            });

            match hit {
                Some((len, replacement)) => {
                    if !replacement.is_empty() {
                        out.push(replacement);
                    }
                    i += len;
                }
                None => {
                    out.push(tokens[i]);
                    i += 1;
                }
            }
        }

        out.join(" ")
    }
}

impl From<HashMap<String, String>> for TokenLookup {
    fn from(map: HashMap<String, String>) -> Self {
        let mut lookup = TokenLookup::new();
        for (from, to) in &map {
            lookup.insert(from, to);
        }
        lookup
    }
}

impl From<TokenLookup> for HashMap<String, String> {
    fn from(lookup: TokenLookup) -> Self {
        lookup.entries
    }
}

/// Normalize a raw name into its comparable form.
///
/// Never fails: input with no letters or digits normalizes to `""`.
pub fn normalize(raw: &str, lookup: Option<&TokenLookup>) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        for lower in c.to_lowercase() {
            if is_combining_mark(lower) {
                continue;
            }
            if lower.is_alphanumeric() {
                if pending_space && !result.is_empty() {
                    result.push(' ');
                }
                pending_space = false;
                result.push(lower);
            } else {
                pending_space = true;
            }
        }
    }

    match lookup {
        Some(lookup) if !lookup.is_empty() => lookup.substitute(&result),
        _ => result,
    }
}

/// A normalizer bound to one token lookup.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    lookup: TokenLookup,
}

impl Normalizer {
    pub fn new(lookup: TokenLookup) -> Self {
        Self { lookup }
    }

    pub fn lookup(&self) -> &TokenLookup {
        &self.lookup
    }

    pub fn normalize(&self, raw: &str) -> String {
        normalize(raw, Some(&self.lookup))
    }
}
