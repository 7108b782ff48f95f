//! Text rendering utilities for human-friendly error messages.
//!
//! Provides helpers to format scope chains, type names,
//! and name suggestions in error output.

/// Renders a scope chain as a readable string.
///
/// # Examples
/// ```
/// use warren_support::rendering::render_chain;
///
/// let chain = vec!["request", "session", "global"];
/// assert_eq!(render_chain(&chain), "request → session → global");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use warren_support::rendering::shorten_type_name;
///
/// let short = shorten_type_name("my_app::db::Pool");
/// assert_eq!(short, "Pool");
///
/// let short = shorten_type_name("alloc::sync::Arc<my_app::http::Request>");
/// assert_eq!(short, "Arc<Request>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut chars = full_name.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Suggests registered names that are close to `requested`.
///
/// Matching is case-insensitive. Substring matches rank first, then
/// names within a small edit distance. At most `max_suggestions`
/// names are returned, best first.
///
/// ```
/// use warren_support::rendering::suggest_similar;
///
/// let names = ["rootInst", "reqInst", "database"];
/// assert_eq!(suggest_similar("rootinst", &names, 3), vec!["rootInst"]);
/// ```
pub fn suggest_similar(
    requested: &str,
    available: &[impl AsRef<str>],
    max_suggestions: usize,
) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let threshold = (requested_lower.chars().count() / 3).max(1);

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| *name != requested)
        .filter_map(|name| {
            let name_lower = name.to_lowercase();

            if name_lower == requested_lower {
                return Some((name, 0));
            }

            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((name, 1));
            }

            let distance = edit_distance(&name_lower, &requested_lower);
            (distance <= threshold).then_some((name, distance + 1))
        })
        .collect();

    scored.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Levenshtein distance over chars, single-row.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }

    row[b.len()]
}
