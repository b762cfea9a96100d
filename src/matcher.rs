use crate::models::Rule;

/// Match a merchant string against one rule pattern.
///
/// Patterns use SQL-style `%` wildcards at the edges only:
/// `%X%` contains, `X%` prefix, `%X` suffix, bare `X` exact.
/// Comparison is case-insensitive; an empty literal never matches.
/// Deliberately no regex: user-supplied patterns must stay fixed-cost.
pub fn pattern_matches(merchant: &str, pattern: &str) -> bool {
    let leading = pattern.starts_with('%');
    let trailing = pattern.len() > leading as usize && pattern.ends_with('%');
    let literal = &pattern[leading as usize..pattern.len() - trailing as usize];
    if literal.is_empty() {
        return false;
    }

    let text = merchant.to_uppercase();
    let needle = literal.to_uppercase();
    match (leading, trailing) {
        (true, true) => text.contains(&needle),
        (false, true) => text.starts_with(&needle),
        (true, false) => text.ends_with(&needle),
        (false, false) => text == needle,
    }
}

/// First matching rule wins. Callers pass rules already ranked by
/// hit count (descending, ties by insertion order), so evaluation is a
/// single O(n) scan with no best-match scoring.
pub fn match_rule<'a>(merchant: &str, rules: &'a [Rule]) -> Option<&'a Rule> {
    rules.iter().find(|r| pattern_matches(merchant, &r.pattern))
}
