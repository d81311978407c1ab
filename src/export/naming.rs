//! File-name derivation for exported fragments

/// Replacement for characters that cannot appear in a file name
pub const PLACEHOLDER: char = '_';

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

fn is_illegal(c: char) -> bool {
    ILLEGAL_CHARS.contains(&c) || c.is_control()
}

/// Replace every character that is illegal in a file name with [`PLACEHOLDER`].
///
/// Legal characters and the character count are preserved, so sanitizing an
/// already sanitized name returns it unchanged. Names that differ only in
/// which illegal character they contain map to the same file name.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if is_illegal(c) { PLACEHOLDER } else { c })
        .collect()
}
