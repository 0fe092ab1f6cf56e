//! Minimal RFC 8288 `Link` header parsing.
//!
//! Hubs send `Link: <https://hub.example/>; rel="hub", <https://feed>; rel="self"`
//! with content notifications. Only targets and `rel` values are extracted.

/// One link-value from a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub target: String,
    /// Relation types, lowercased. `rel="self hub"` yields two.
    pub rels: Vec<String>,
}

impl Link {
    pub fn has_rel(&self, rel: &str) -> bool {
        self.rels.iter().any(|r| r.eq_ignore_ascii_case(rel))
    }
}

/// Parses every link-value in one header value.
///
/// Link-values that do not start with `<target>` are skipped.
pub fn parse_link_header(value: &str) -> Vec<Link> {
    let mut links = Vec::new();
    let mut rest = value;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let Some(after_open) = rest.strip_prefix('<') else {
            // Not a link-value; resync at the next top-level comma
            let (_, remainder) = split_unquoted(rest, ',');
            rest = remainder;
            continue;
        };
        let Some(close) = after_open.find('>') else {
            break;
        };
        let target = after_open[..close].trim().to_string();
        let (params, remainder) = split_unquoted(&after_open[close + 1..], ',');
        rest = remainder;

        links.push(Link {
            target,
            rels: rel_values(params),
        });
    }

    links
}

/// Target of the first `rel="self"` link across all header values.
pub fn self_link<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .flat_map(parse_link_header)
        .find(|link| link.has_rel("self") && !link.target.is_empty())
        .map(|link| link.target)
}

fn rel_values(params: &str) -> Vec<String> {
    let mut rels = Vec::new();
    let mut rest = params;
    while !rest.is_empty() {
        let (param, remainder) = split_unquoted(rest, ';');
        rest = remainder;
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("rel") {
            let value = value.trim().trim_matches('"');
            rels.extend(value.split_whitespace().map(str::to_ascii_lowercase));
        }
    }
    rels
}

/// Splits at the first `delimiter` outside double quotes. The delimiter is
/// dropped; without one the whole input is returned with an empty remainder.
fn split_unquoted(input: &str, delimiter: char) -> (&str, &str) {
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == delimiter && !quoted => {
                return (&input[..i], &input[i + c.len_utf8()..]);
            }
            _ => {}
        }
    }
    (input, "")
}
