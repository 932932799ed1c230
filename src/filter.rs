//! Subject filter
//!
//! The search predicate: a subject matches when it contains the search
//! term as a literal substring. No wildcards, no regex, no case
//! folding; an empty term matches every subject.

/// Whether a subject matches the search term.
#[must_use]
pub fn subject_matches(subject: &str, term: &str) -> bool {
    subject.contains(term)
}
