use repotrace_indexer::CodeUnit;
use std::collections::BTreeSet;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "when", "then", "should",
    "must", "will", "can", "add", "new", "support", "feature", "allow", "our", "are", "its",
    "self", "def", "function", "return", "fn", "pub",
];

/// Lowercased word tokens of `text`: splits on non-alphanumerics, snake_case and camelCase
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for word in text.split(|c: char| !c.is_ascii_alphanumeric()) {
        for part in split_camel_case(word) {
            let token = part.to_ascii_lowercase();
            if token.len() < 3 || STOPWORDS.contains(&token.as_str()) {
                continue;
            }
            tokens.insert(token);
        }
    }
    tokens
}

fn split_camel_case(word: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut prev_lower = false;
    for (i, ch) in word.char_indices() {
        if ch.is_ascii_uppercase() && prev_lower {
            parts.push(&word[start..i]);
            start = i;
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
    }
    if start < word.len() {
        parts.push(&word[start..]);
    }
    parts
}

/// Tokens describing a unit: path, symbol and documentation
pub fn unit_tokens(unit: &CodeUnit) -> BTreeSet<String> {
    let mut tokens = tokenize(unit.id.path());
    tokens.extend(tokenize(unit.id.symbol()));
    if let Some(doc) = &unit.documentation {
        tokens.extend(tokenize(doc));
    }
    tokens
}

/// Number of query tokens the unit shares
pub fn overlap_score(query: &BTreeSet<String>, unit: &CodeUnit) -> usize {
    if query.is_empty() {
        return 0;
    }
    unit_tokens(unit).intersection(query).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_identifiers_and_drops_noise() {
        let tokens: Vec<String> = tokenize("Add refund support to applyDiscount in order_service")
            .into_iter()
            .collect();
        assert_eq!(
            tokens,
            vec!["apply", "discount", "order", "refund", "service"]
        );
    }

    #[test]
    fn keeps_acronym_runs_together() {
        let tokens = tokenize("parseHTTPResponse");
        assert!(tokens.contains("parse"));
        assert!(tokens.contains("httpresponse"));
    }
}
