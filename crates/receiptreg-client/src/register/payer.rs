use regex::Regex;

use crate::model::OwnerType;
use crate::{ClientError, ClientResult};

const ACCOUNT_MARKERS: &str = r"(?i)(лицевой\s+сч[её]т|л/с|л\.\s?с\.?|\bлс\b|№)";
const ORGANIZATION_FORMS: &str =
    r"(?i)\b(ооо|оао|зао|пао|ао|ип|тсж|тсн|жск|снт|гуп|муп|llc|inc|ltd|corp|gmbh)\b";
const PERSON_FULL_NAME: &str = r"^\p{Lu}\p{Ll}+(-\p{Lu}\p{Ll}+)?(\s+\p{Lu}\p{Ll}+){1,2}$";
const PERSON_INITIALS: &str = r"^\p{Lu}\p{Ll}+(-\p{Lu}\p{Ll}+)?\s+\p{Lu}\.\s?(\p{Lu}\.?)?$";

fn compile(pattern: &str) -> ClientResult<Regex> {
    Regex::new(pattern)
        .map_err(|error| ClientError::internal_pattern(pattern, &error.to_string()))
}

/// Strips "personal account" markers from account numbers.
#[derive(Debug, Clone)]
pub struct AccountNumberCleaner {
    markers: Regex,
}

impl AccountNumberCleaner {
    pub fn new() -> ClientResult<Self> {
        Ok(Self {
            markers: compile(ACCOUNT_MARKERS)?,
        })
    }

    /// Idempotent: cleaning an already clean number returns it unchanged.
    pub fn clean(&self, value: &str) -> String {
        let mut current = value.trim().to_string();
        loop {
            let stripped = self.markers.replace_all(&current, " ");
            let next = stripped
                .trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '#' | '.'))
                .to_string();
            if next == current {
                return next;
            }
            current = next;
        }
    }
}

/// Decides whether an account holder name belongs to a person or a company.
#[derive(Debug, Clone)]
pub struct PayerClassifier {
    organization_forms: Regex,
    full_name: Regex,
    initials: Regex,
}

impl PayerClassifier {
    pub fn new() -> ClientResult<Self> {
        Ok(Self {
            organization_forms: compile(ORGANIZATION_FORMS)?,
            full_name: compile(PERSON_FULL_NAME)?,
            initials: compile(PERSON_INITIALS)?,
        })
    }

    pub fn classify(&self, full_name: Option<&str>) -> OwnerType {
        let name = full_name.map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return OwnerType::Person;
        }
        if self.organization_forms.is_match(name) {
            return OwnerType::Company;
        }
        if self.full_name.is_match(name) || self.initials.is_match(name) {
            return OwnerType::Person;
        }
        OwnerType::Company
    }
}

/// Unified account number: two digits, two capital letters, six digits.
pub fn is_valid_account_global_id(value: &str) -> bool {
    let chars: Vec<char> = value.chars().collect();
    chars.len() == 10
        && chars[..2].iter().all(char::is_ascii_digit)
        && chars[2..4]
            .iter()
            .all(|c| c.is_ascii_uppercase() || ('А'..='Я').contains(c))
        && chars[4..].iter().all(char::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::{AccountNumberCleaner, PayerClassifier, is_valid_account_global_id};
    use crate::model::OwnerType;

    fn cleaner() -> AccountNumberCleaner {
        match AccountNumberCleaner::new() {
            Ok(cleaner) => cleaner,
            Err(error) => panic!("cleaner failed to build: {error}"),
        }
    }

    fn classifier() -> PayerClassifier {
        match PayerClassifier::new() {
            Ok(classifier) => classifier,
            Err(error) => panic!("classifier failed to build: {error}"),
        }
    }

    #[test]
    fn strips_account_markers_in_any_case() {
        let cleaner = cleaner();
        let cases = [
            ("лс 20-I-1", "20-I-1"),
            ("ЛС 20-I-1", "20-I-1"),
            ("Л/С 4410", "4410"),
            ("л.с. 4410", "4410"),
            ("№ 4410", "4410"),
            ("Лицевой счет: 4410", "4410"),
            ("ЛИЦЕВОЙ СЧЁТ №4410", "4410"),
            ("  4410  ", "4410"),
        ];
        for (input, expected) in cases {
            assert_eq!(cleaner.clean(input), expected, "input: {input}");
        }
    }

    #[test]
    fn cleanup_is_idempotent() {
        let cleaner = cleaner();
        for input in ["лс лс 12", "№ л/с 12", "12-лс", "ЛС", ""] {
            let once = cleaner.clean(input);
            assert_eq!(cleaner.clean(&once), once, "input: {input}");
        }
        assert_eq!(cleaner.clean("ЛС"), "");
    }

    #[test]
    fn markers_inside_words_are_kept() {
        assert_eq!(cleaner().clean("класс 7"), "класс 7");
    }

    #[test]
    fn classifies_payers() {
        let classifier = classifier();
        assert_eq!(classifier.classify(None), OwnerType::Person);
        assert_eq!(classifier.classify(Some("  ")), OwnerType::Person);
        assert_eq!(
            classifier.classify(Some("Иванов Иван Иванович")),
            OwnerType::Person
        );
        assert_eq!(classifier.classify(Some("Петров П. П.")), OwnerType::Person);
        assert_eq!(classifier.classify(Some("Jane Doe")), OwnerType::Person);
        assert_eq!(
            classifier.classify(Some("ООО \"Ромашка\"")),
            OwnerType::Company
        );
        assert_eq!(classifier.classify(Some("Acme LLC")), OwnerType::Company);
        assert_eq!(classifier.classify(Some("ТСЖ Ленина 5")), OwnerType::Company);
        assert_eq!(classifier.classify(Some("Городской водоканал")), OwnerType::Company);
    }

    #[test]
    fn validates_unified_account_numbers() {
        assert!(is_valid_account_global_id("12АБ345678"));
        assert!(is_valid_account_global_id("12AB345678"));
        assert!(!is_valid_account_global_id("12аб345678"));
        assert!(!is_valid_account_global_id("12AB34567"));
        assert!(!is_valid_account_global_id("AB12345678"));
    }
}
