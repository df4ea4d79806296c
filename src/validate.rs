//! Syntactic email address check.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// Whether `input`, once trimmed, looks like `local@domain.tld`.
///
/// No DNS or mailbox checks are made.
pub fn is_valid_email(input: &str) -> bool {
    EMAIL_RE.is_match(input.trim())
}
