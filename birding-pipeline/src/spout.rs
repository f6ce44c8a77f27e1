//! Term source: cycles the configured terms forever.

use chrono::{DateTime, SecondsFormat, Utc};

/// A search term stamped with the time it was emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub term: String,
    /// RFC 3339, UTC
    pub timestamp: String,
}

impl Term {
    pub fn new(term: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            term: term.into(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

/// Emits each configured term in order, then starts over.
///
/// Never ends unless it was given no terms at all.
#[derive(Debug, Clone)]
pub struct TermCycle {
    terms: Vec<String>,
    next: usize,
}

impl TermCycle {
    pub fn new(terms: Vec<String>) -> Self {
        Self { terms, next: 0 }
    }

    /// Emits the next term stamped with `now`.
    pub fn next_at(&mut self, now: DateTime<Utc>) -> Option<Term> {
        let term = self.terms.get(self.next)?;
        self.next = (self.next + 1) % self.terms.len();
        Some(Term::new(term.as_str(), now))
    }
}

impl Iterator for TermCycle {
    type Item = Term;

    fn next(&mut self) -> Option<Term> {
        self.next_at(Utc::now())
    }
}
