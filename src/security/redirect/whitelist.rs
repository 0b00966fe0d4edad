//! Redirect domain whitelist.
//!
//! # Design Decisions
//! - Entries are plain domains stored in a set; no pattern language, so
//!   nothing in an entry can act as a wildcard
//! - A host matches when it, or any suffix starting after one of its dots,
//!   is in the set. Suffixes therefore always begin on a label boundary
//! - Matching is case-insensitive and ignores a trailing root dot

use std::collections::HashSet;

use super::RedirectError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectWhitelist {
    domains: HashSet<String>,
}

impl RedirectWhitelist {
    /// Compile whitelist entries. A leading `.` or `*.` is accepted and
    /// means the same as the bare domain.
    pub fn new<I, S>(entries: I) -> Result<Self, RedirectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = entries
            .into_iter()
            .map(|entry| normalize_entry(entry.as_ref()))
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(Self { domains })
    }

    /// An empty whitelist places no restriction on redirects.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn matches(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        let mut candidate = host.as_str();
        loop {
            if candidate.is_empty() {
                return false;
            }
            if self.domains.contains(candidate) {
                return true;
            }
            match candidate.split_once('.') {
                Some((_, parent)) => candidate = parent,
                None => return false,
            }
        }
    }
}

fn normalize_entry(raw: &str) -> Result<String, RedirectError> {
    let invalid = || RedirectError::InvalidWhitelistEntry(raw.to_string());

    let trimmed = raw.trim();
    let domain = trimmed
        .strip_prefix("*.")
        .or_else(|| trimmed.strip_prefix('.'))
        .unwrap_or(trimmed)
        .trim_end_matches('.');

    if domain.is_empty() || domain.split('.').any(str::is_empty) {
        return Err(invalid());
    }
    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid());
    }

    Ok(domain.to_ascii_lowercase())
}
