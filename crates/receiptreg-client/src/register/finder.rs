use crate::model::OrganizationProperty;

const SYMBOLS_TO_REMOVE: &[char] = &[
    '!', '@', '#', '$', '%', '^', '&', '*', ')', '(', '+', '=', '_', ':', '"', '\'', '`', '[', ']',
];
const SPLITTERS: &[char] = &[',', ';', '.', '-', '/'];

/// Lowercased address tokens with punctuation dropped and `ё` folded to `е`.
/// Single letters are discarded, single digits are kept.
pub fn address_tokens(address: &str) -> Vec<String> {
    let cleaned: String = address
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, 'ё' | 'ë') { 'е' } else { c })
        .filter(|c| !SYMBOLS_TO_REMOVE.contains(c))
        .collect();

    cleaned
        .split(|c: char| c.is_whitespace() || SPLITTERS.contains(&c))
        .filter(|token| !token.is_empty())
        .filter(|token| token.chars().count() > 1 || token.chars().all(|c| c.is_ascii_digit()))
        .map(ToString::to_string)
        .collect()
}

/// Tokens of `left` found in `right` in the same relative order. Every match
/// moves the search window in `right` past the matched token.
pub fn ordered_intersection<'a>(left: &'a [String], right: &[String]) -> Vec<&'a str> {
    let mut matched = Vec::new();
    let mut cursor = 0;
    for token in left {
        if let Some(position) = right[cursor..].iter().position(|candidate| candidate == token) {
            matched.push(token.as_str());
            cursor += position + 1;
        }
    }
    matched
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundProperty {
    pub address: String,
    pub address_key: String,
    pub score: usize,
}

/// Fuzzy matcher over the organization's own properties, used when
/// addresses cannot go through external normalization.
#[derive(Debug, Clone, Default)]
pub struct PropertyFinder {
    properties: Vec<(OrganizationProperty, Vec<String>)>,
}

impl PropertyFinder {
    pub fn new(properties: &[OrganizationProperty]) -> Self {
        Self {
            properties: properties
                .iter()
                .map(|property| (property.clone(), address_tokens(&property.address)))
                .collect(),
        }
    }

    /// Highest scoring property; ties go to the earliest one. A score of zero
    /// is no match.
    pub fn find(&self, address: &str) -> Option<FoundProperty> {
        let target = address_tokens(address);
        let mut best: Option<(&OrganizationProperty, usize)> = None;
        for (property, tokens) in &self.properties {
            let score = ordered_intersection(&target, tokens).len();
            if score > best.map_or(0, |(_, best_score)| best_score) {
                best = Some((property, score));
            }
        }
        best.map(|(property, score)| FoundProperty {
            address: property.address.clone(),
            address_key: property.address_key.clone(),
            score,
        })
    }
}
