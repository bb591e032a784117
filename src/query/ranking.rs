// Hybrid scoring
//
// Combines lexical similarity against the query, structural importance
// (PageRank plus degree), and an optional semantic score when a reranker is
// attached. Weights follow the shares that worked in practice for symbol
// search: lexical dominates, structure breaks ties, semantics nudges.

const WEIGHT_LEXICAL: f64 = 0.45;
const WEIGHT_STRUCTURAL: f64 = 0.35;
const WEIGHT_DEGREE: f64 = 0.20;

/// Lexical similarity of a symbol name against the query text, in [0, 1].
pub fn lexical_score(query: &str, name: &str, qualified_name: &str) -> f64 {
    let query_lower = query.to_lowercase();
    let name_lower = name.to_lowercase();
    if name_lower == query_lower {
        1.0
    } else if name_lower.starts_with(&query_lower) {
        0.9
    } else if name_lower.contains(&query_lower) {
        0.7
    } else if qualified_name.to_lowercase().contains(&query_lower) {
        0.6
    } else {
        // token overlap between query words and the name
        let name_tokens: Vec<&str> = name_lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        let query_tokens: Vec<&str> = query_lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        if query_tokens.is_empty() {
            return 0.0;
        }
        let overlap = query_tokens
            .iter()
            .filter(|t| name_tokens.contains(*t))
            .count();
        0.5 * overlap as f64 / query_tokens.len() as f64
    }
}

/// Blend the components. `pagerank_norm` and `degree_norm` must already be
/// scaled to [0, 1] against the candidate set.
pub fn hybrid_score(lexical: f64, pagerank_norm: f64, degree_norm: f64) -> f64 {
    WEIGHT_LEXICAL * lexical + WEIGHT_STRUCTURAL * pagerank_norm + WEIGHT_DEGREE * degree_norm
}

/// Normalize a raw value against the maximum in its candidate set.
pub fn normalize(value: f64, max: f64) -> f64 {
    if max <= 0.0 { 0.0 } else { (value / max).clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_beats_prefix_beats_substring() {
        let exact = lexical_score("auth", "auth", "m.auth");
        let prefix = lexical_score("auth", "authenticate", "m.authenticate");
        let substring = lexical_score("auth", "preauth_check", "m.preauth_check");
        assert!(exact > prefix);
        assert!(prefix > substring);
    }

    #[test]
    fn hybrid_orders_by_blend() {
        let strong = hybrid_score(1.0, 0.5, 0.5);
        let weak = hybrid_score(0.6, 0.5, 0.5);
        assert!(strong > weak);
        assert!(hybrid_score(1.0, 1.0, 1.0) <= 1.0 + 1e-9);
    }

    #[test]
    fn normalize_handles_zero_max() {
        assert_eq!(normalize(1.0, 0.0), 0.0);
        assert_eq!(normalize(0.5, 1.0), 0.5);
    }
}
