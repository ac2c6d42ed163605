use regex::Regex;

use crate::config::TransformRule;
use crate::model::UnitType;

/// Ordered, organization-specific rewrites applied to raw addresses before
/// they are normalized.
#[derive(Debug, Clone, Default)]
pub struct AddressTransform {
    regex_rules: Vec<(Regex, String)>,
    literal_rules: Vec<(String, String)>,
}

impl AddressTransform {
    pub fn from_rules(rules: &[TransformRule]) -> Self {
        let mut transform = Self::default();
        for rule in rules {
            if let Some(pattern) = rule.from.strip_prefix('r') {
                match Regex::new(pattern) {
                    Ok(regex) => transform
                        .regex_rules
                        .push((regex, convert_replacement(&rule.to))),
                    Err(error) => {
                        tracing::warn!(rule = %rule.from, %error, "skipping invalid address transform rule");
                    }
                }
            } else if !rule.from.is_empty() {
                transform
                    .literal_rules
                    .push((rule.from.clone(), rule.to.clone()));
            }
        }
        transform
    }

    pub fn apply(&self, input: &str) -> String {
        let mut value = input.to_string();
        for (regex, replacement) in &self.regex_rules {
            value = regex
                .replace_all(value.trim(), replacement.as_str())
                .into_owned();
        }
        for (from, to) in &self.literal_rules {
            value = value.trim().replace(from.as_str(), to);
        }
        collapse_whitespace(&value)
    }
}

/// Rewrites `$1`-style group references into the `${1}` form so a group
/// number is never read together with the text that follows it.
fn convert_replacement(replacement: &str) -> String {
    let mut converted = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(current) = chars.next() {
        if current != '$' {
            converted.push(current);
            continue;
        }
        match chars.peek().copied() {
            Some(next) if next.is_ascii_digit() => {
                let mut group = String::new();
                while let Some(digit) = chars.peek().copied().filter(char::is_ascii_digit) {
                    group.push(digit);
                    chars.next();
                }
                converted.push_str(&format!("${{{group}}}"));
            }
            Some('&') => {
                chars.next();
                converted.push_str("${0}");
            }
            Some('$') => {
                chars.next();
                converted.push_str("$$");
            }
            _ => converted.push_str("$$"),
        }
    }
    converted
}

pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub house: String,
    pub unit_name: String,
    pub unit_type: Option<UnitType>,
}

const UNIT_KEYWORDS: [(&str, UnitType); 25] = [
    ("нежилое помещение", UnitType::Commercial),
    ("машино-место", UnitType::Parking),
    ("машиноместо", UnitType::Parking),
    ("апартаменты", UnitType::Apartment),
    ("помещение", UnitType::Commercial),
    ("квартира", UnitType::Flat),
    ("кладовая", UnitType::Warehouse),
    ("кладовка", UnitType::Warehouse),
    ("warehouse", UnitType::Warehouse),
    ("commercial", UnitType::Commercial),
    ("паркинг", UnitType::Parking),
    ("parking", UnitType::Parking),
    ("storage", UnitType::Warehouse),
    ("апарт", UnitType::Apartment),
    ("office", UnitType::Commercial),
    ("офис", UnitType::Commercial),
    ("flat", UnitType::Flat),
    ("кл", UnitType::Warehouse),
    ("м/м", UnitType::Parking),
    ("мм", UnitType::Parking),
    ("apt", UnitType::Apartment),
    ("пом", UnitType::Commercial),
    ("нп", UnitType::Commercial),
    ("кв", UnitType::Flat),
    ("ап", UnitType::Apartment),
];

/// Finds a unit keyword at the start of `text`. The keyword must not run
/// into further letters or a hyphen, so `пом` never matches `помещение` and
/// `кв` never matches `кв-л`.
fn match_unit_keyword(text: &str) -> Option<(UnitType, usize)> {
    let lowered = text.to_lowercase();
    if lowered.len() != text.len() {
        return None;
    }
    UNIT_KEYWORDS
        .iter()
        .filter(|(keyword, _)| lowered.starts_with(keyword))
        .filter(|(keyword, _)| {
            lowered[keyword.len()..]
                .chars()
                .next()
                .is_none_or(|next| !next.is_alphabetic() && next != '-')
        })
        .max_by_key(|(keyword, _)| keyword.len())
        .map(|(keyword, unit_type)| (*unit_type, keyword.len()))
}

fn clean_unit_name(value: &str) -> String {
    value
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '.' | '№' | ':' | '#'))
        .trim()
        .to_string()
}

/// Maps free text such as `машиноместо 3` onto a unit type and name.
pub fn parse_unit(text: &str) -> (String, Option<UnitType>) {
    let trimmed = text.trim();
    match match_unit_keyword(trimmed) {
        Some((unit_type, keyword_len)) => {
            let rest = trimmed.get(keyword_len..).unwrap_or_default();
            (clean_unit_name(rest), Some(unit_type))
        }
        None => (trimmed.to_string(), None),
    }
}

/// Splits an address into the house part and an optional unit.
pub fn parse_address(input: &str) -> ParsedAddress {
    let segments: Vec<&str> = input.split(',').collect();
    let mut offset = segments.first().map_or(0, |first| first.len() + 1);

    for (position, segment) in segments.iter().enumerate().skip(1) {
        let leading = segment.len() - segment.trim_start().len();
        if let Some((unit_type, keyword_len)) = match_unit_keyword(segment.trim_start()) {
            let unit_start = offset + leading + keyword_len;
            return ParsedAddress {
                house: join_house(&segments[..position]),
                unit_name: clean_unit_name(input.get(unit_start..).unwrap_or_default()),
                unit_type: Some(unit_type),
            };
        }
        offset += segment.len() + 1;
    }

    if segments.len() > 1 {
        let last = segments[segments.len() - 1].trim();
        let preceding = &segments[..segments.len() - 1];
        let starts_with_digit = last.chars().next().is_some_and(|c| c.is_ascii_digit());
        let has_house_number = preceding
            .iter()
            .any(|segment| segment.chars().any(|c| c.is_ascii_digit()));
        if starts_with_digit && !last.contains(char::is_whitespace) && has_house_number {
            return ParsedAddress {
                house: join_house(preceding),
                unit_name: last.to_string(),
                unit_type: Some(UnitType::Flat),
            };
        }
    }

    ParsedAddress {
        house: join_house(&segments),
        unit_name: String::new(),
        unit_type: None,
    }
}

fn join_house(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| segment.trim())
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_uuid(value: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let parts: Vec<&str> = value.split('-').collect();
    parts.len() == GROUPS.len()
        && parts
            .iter()
            .zip(GROUPS)
            .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// True when the value is a UUID, optionally followed by `,<unit>`.
pub fn is_valid_global_id(value: &str) -> bool {
    value
        .split(',')
        .next()
        .is_some_and(|head| is_uuid(head.trim()))
}

pub fn normalize_property_global_id(value: Option<&str>) -> Option<String> {
    let head = value?.split(',').next()?.trim();
    is_uuid(head).then(|| head.to_lowercase())
}
