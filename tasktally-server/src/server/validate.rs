use unicode_segmentation::UnicodeSegmentation;

/// Plausible-shape check: one '@', non-empty local part, domain with an
/// interior dot, no whitespace anywhere.
pub fn is_valid_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = s.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}

/// Alphanumeric, at least 3 characters.
pub fn is_valid_username(s: &str) -> bool {
    s.len() >= 3 && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// At least 6 printable ASCII characters, no whitespace.
pub fn is_valid_password(s: &str) -> bool {
    s.len() >= 6 && s.chars().all(|c| c.is_ascii_graphic())
}

/// One visible character, the way a DB `char_length() = 1` constraint on an
/// emoji column would count it: exactly one grapheme cluster (so ZWJ
/// sequences like a family emoji pass), and not a plain ASCII character.
pub fn is_single_emoji(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() || s.is_ascii() {
        return false;
    }
    s.graphemes(true).count() == 1
}
