//! Bibliography entries and document matching.
//!
//! A bibliography is an optional collaborator: parsed BibTeX entries with a
//! cite key, title, and authors. Matching a processed document to an entry is
//! done on *title similarity*, not filename conventions — the derived title
//! from page 1 is compared against every entry's title after normalization,
//! and only a match clearing the configured threshold sets `cite_key` and
//! `bib_context`. Below the threshold the document simply stays unmatched;
//! guessing would poison the knowledge index.
//!
//! The parser here covers the subset of BibTeX that citation managers
//! actually emit: `@type{key, field = {value}, ...}` with brace- or
//! quote-delimited values, arbitrarily nested braces inside values, and
//! `and`-separated author lists.

use crate::error::PaperdexError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One parsed bibliography entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BibEntry {
    pub cite_key: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

/// A parsed bibliography file.
#[derive(Debug, Clone, Default)]
pub struct Bibliography {
    entries: Vec<BibEntry>,
}

impl Bibliography {
    /// Load and parse a `.bib` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PaperdexError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PaperdexError::BibUnreadable {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Ok(Self::parse(&text))
    }

    /// Parse BibTeX text. Unparseable fragments are skipped, not fatal — a
    /// bibliography with one broken entry is still useful.
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut rest = text;

        while let Some(at) = rest.find('@') {
            rest = &rest[at + 1..];
            let Some(brace) = rest.find('{') else { break };
            let kind = rest[..brace].trim().to_lowercase();
            let Some((body, tail)) = balanced_block(&rest[brace..]) else {
                break;
            };
            rest = tail;
            if kind == "comment" || kind == "preamble" || kind == "string" {
                continue;
            }
            if let Some(entry) = parse_entry(body) {
                entries.push(entry);
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[BibEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry whose title best matches `title`, requiring at least
    /// `threshold` token-overlap Jaccard similarity (or normalized substring
    /// containment, which handles truncated bibliography titles).
    ///
    /// Returns `None` when no entry clears the threshold.
    pub fn best_match(&self, title: &str, threshold: f64) -> Option<&BibEntry> {
        let target = normalize_title(title);
        if target.is_empty() {
            return None;
        }

        let mut best: Option<(&BibEntry, f64)> = None;
        for entry in &self.entries {
            let candidate = normalize_title(&entry.title);
            if candidate.is_empty() {
                continue;
            }

            let score = if candidate.contains(&target) || target.contains(&candidate) {
                1.0
            } else {
                token_jaccard(&target, &candidate)
            };

            if score >= threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((entry, score));
            }
        }
        best.map(|(entry, _)| entry)
    }
}

/// Lower-case, strip everything but alphanumerics, collapse whitespace.
fn normalize_title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Jaccard similarity over whitespace tokens of two normalized titles.
fn token_jaccard(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Given text starting at `{`, return (content without the outer braces,
/// remaining text after the closing brace). `None` if braces never balance.
fn balanced_block(text: &str) -> Option<(&str, &str)> {
    debug_assert!(text.starts_with('{'));
    let mut depth = 0usize;
    for (idx, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&text[1..idx], &text[idx + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the body of one entry: `key, field = value, ...`.
fn parse_entry(body: &str) -> Option<BibEntry> {
    let comma = body.find(',')?;
    let cite_key = body[..comma].trim().to_string();
    if cite_key.is_empty() {
        return None;
    }

    let mut entry = BibEntry {
        cite_key,
        ..BibEntry::default()
    };

    let mut rest = body[comma + 1..].trim_start();
    while let Some(eq) = rest.find('=') {
        let name = rest[..eq].trim_matches(|c: char| c == ',' || c.is_whitespace());
        let name = name.to_lowercase();
        rest = rest[eq + 1..].trim_start();

        let (value, tail) = if rest.starts_with('{') {
            match balanced_block(rest) {
                Some((v, t)) => (v.to_string(), t),
                None => break,
            }
        } else if let Some(stripped) = rest.strip_prefix('"') {
            match stripped.find('"') {
                Some(end) => (stripped[..end].to_string(), &stripped[end + 1..]),
                None => break,
            }
        } else {
            // Bare value (e.g. year = 2021), runs to the next comma.
            let end = rest.find(',').unwrap_or(rest.len());
            (rest[..end].trim().to_string(), &rest[end..])
        };
        rest = tail.trim_start().trim_start_matches(',').trim_start();

        let value = clean_value(&value);
        match name.as_str() {
            "title" => entry.title = value,
            "author" => {
                entry.authors = value
                    .split(" and ")
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect()
            }
            "year" => entry.year = Some(value),
            "journal" => entry.journal = Some(value),
            "doi" => entry.doi = Some(value),
            _ => {}
        }
    }

    Some(entry)
}

/// Drop protective braces and collapse internal whitespace.
fn clean_value(value: &str) -> String {
    let stripped: String = value.chars().filter(|&c| c != '{' && c != '}').collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
