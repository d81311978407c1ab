//! Shared utility helpers.

use std::cmp::Ordering;

/// Case-insensitive ordering without allocating lowercase copies.
///
/// Ties between names that differ only by case are broken by the raw
/// byte order, so the result is a total order.
#[inline]
pub fn cmp_ci(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| a.cmp(b))
}

/// Case-insensitive starts_with check without allocating.
#[inline]
pub fn starts_with_ci(haystack: &str, needle: &str) -> bool {
    haystack.len() >= needle.len()
        && haystack.is_char_boundary(needle.len())
        && haystack.as_bytes()[..needle.len()].eq_ignore_ascii_case(needle.as_bytes())
}

/// Escape a value for use inside a single-quoted OData string literal.
pub fn odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}
