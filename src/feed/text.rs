use quick_xml::escape::resolve_predefined_entity;

/// Collapses runs of whitespace (including line folds) into single spaces
/// and trims both ends.
///
/// Feed generators wrap long titles and attribute values across lines; the
/// published form should not carry those folds.
pub fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Trims `s` and returns `None` when nothing is left.
pub fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Resolves a named entity reference to its replacement text.
///
/// Covers the five XML builtins plus the HTML named entities that show up
/// in feed titles in practice. Anything else stays unresolved and makes
/// unescaping fail, which the parser reports as a warning.
///
/// SEC-002: This is a fixed table. DOCTYPE-declared entities are never
/// consulted, so there is no entity expansion from the payload itself.
pub fn resolve_entity(name: &str) -> Option<&'static str> {
    if let Some(builtin) = resolve_predefined_entity(name) {
        return Some(builtin);
    }
    let resolved = match name {
        "nbsp" => "\u{a0}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "sbquo" => "\u{201a}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "bdquo" => "\u{201e}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "bull" => "\u{2022}",
        "middot" => "\u{b7}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "deg" => "\u{b0}",
        "euro" => "\u{20ac}",
        "pound" => "\u{a3}",
        "times" => "\u{d7}",
        _ => return None,
    };
    Some(resolved)
}
