//! Result reporter
//!
//! Turns the filtered envelope list into user-facing output: either a
//! "no matches" sentinel (optionally escalated to an error) or one
//! subject per line in sequence order.

use crate::envelope::Envelope;
use crate::error::{Error, Result};
use std::io::Write;

/// Write the search outcome to `out`.
///
/// With no matches and `fail_on_empty` unset, prints the sentinel line
/// and succeeds. With `fail_on_empty` set, returns
/// [`Error::EmptyResult`] instead so the caller exits non-zero.
///
/// # Errors
///
/// Returns [`Error::EmptyResult`] on zero matches with `fail_on_empty`
/// set, or an IO error if `out` cannot be written.
pub fn report<W: Write>(
    out: &mut W,
    matches: &[Envelope],
    term: &str,
    fail_on_empty: bool,
) -> Result<()> {
    if matches.is_empty() {
        if fail_on_empty {
            return Err(Error::EmptyResult(term.to_string()));
        }
        writeln!(out, "Found no messages matching the search term: {term:?}")?;
        return Ok(());
    }

    for envelope in matches {
        writeln!(out, "{}", envelope.subject)?;
    }
    Ok(())
}
