use std::collections::BTreeSet;

use crate::ClientError;
use crate::ClientResult;
use crate::model::{BillingCategory, UnitType};
use crate::register::errors::ErrorCode;
use crate::register::record::{ReceiptBatch, WorkingRecord};
use crate::register::resolver::{ResolveEnv, Resolver, ResolverBase, StageReport, StageResult};

pub const DEFAULT_CATEGORY_ID: &str = "928c97ef-5289-4daa-b80e-4b9fed50c629";

fn category_name_for_unit(unit_type: UnitType) -> Option<&'static str> {
    match unit_type {
        UnitType::Parking => Some("Parking"),
        UnitType::Warehouse => Some("Storage room"),
        UnitType::Commercial => Some("Commercial premises"),
        UnitType::Flat | UnitType::Apartment => None,
    }
}

pub struct CategoryResolver {
    base: ResolverBase,
    categories: Vec<(String, String, BTreeSet<String>)>,
}

impl CategoryResolver {
    pub fn new() -> Self {
        Self {
            base: ResolverBase::new("category"),
            categories: Vec::new(),
        }
    }

    /// Loads categories directly, bypassing the store.
    pub fn with_categories(categories: Vec<BillingCategory>) -> Self {
        let mut resolver = Self::new();
        resolver.load(categories);
        resolver
    }

    fn load(&mut self, categories: Vec<BillingCategory>) {
        self.categories = categories
            .into_iter()
            .map(|category| {
                let keywords = category
                    .service_names
                    .iter()
                    .map(|name| name.to_lowercase())
                    .collect();
                (category.id, category.name, keywords)
            })
            .collect();
    }

    fn contains(&self, category_id: &str) -> bool {
        self.categories.iter().any(|(id, _, _)| id == category_id)
    }

    fn id_by_name(&self, name: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, category_name, _)| category_name == name)
            .map(|(id, _, _)| id.as_str())
    }

    /// Category whose keywords cover every service name. When several do,
    /// the last one in store order wins.
    pub fn detect_category_by_services(&self, services: &[String]) -> String {
        if services.is_empty() {
            return DEFAULT_CATEGORY_ID.to_string();
        }
        let names: BTreeSet<String> = services.iter().map(|name| name.to_lowercase()).collect();
        let mut detected = DEFAULT_CATEGORY_ID;
        for (id, _, keywords) in &self.categories {
            if keywords.is_empty() {
                continue;
            }
            if names.difference(keywords).next().is_none() {
                detected = id.as_str();
            }
        }
        detected.to_string()
    }

    fn resolve_record(&self, record: &WorkingRecord, force_detect: bool) -> Result<String, String> {
        let declared = record
            .raw()
            .category
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        if let Some(category_id) = declared {
            if !self.contains(category_id) {
                return Err(format!("unknown category `{category_id}`"));
            }
            if !force_detect {
                return Ok(category_id.to_string());
            }
        }

        let detected = self.detect_category_by_services(&record.raw().service_names());
        if detected != DEFAULT_CATEGORY_ID {
            return Ok(detected);
        }

        let by_unit = record
            .address_resolve()
            .and_then(|resolve| resolve.unit_type)
            .and_then(category_name_for_unit)
            .and_then(|name| self.id_by_name(name));
        Ok(by_unit.unwrap_or(DEFAULT_CATEGORY_ID).to_string())
    }
}

impl Default for CategoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for CategoryResolver {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn init(&mut self, env: &ResolveEnv<'_>) -> ClientResult<()> {
        let categories = env.store.categories().map_err(|error| {
            ClientError::reference_data_unavailable(self.base.name(), &error.message)
        })?;
        self.load(categories);
        Ok(())
    }

    fn process_receipts(&mut self, env: &ResolveEnv<'_>, batch: &mut ReceiptBatch) -> StageResult {
        let force_detect = env.context.settings.force_category_detect;
        let mut result = StageResult::default();

        for record in batch.records_mut() {
            let index = record.index();
            match self.resolve_record(record, force_detect) {
                Ok(category_id) => {
                    tracing::debug!(index, category = %category_id, "category resolved");
                    record.set_category(category_id);
                    result.succeed(index);
                }
                Err(cause) => {
                    result.fail(
                        self.base
                            .error(ErrorCode::BillingCategoryNotFound, index, &cause),
                    );
                }
            }
        }

        result
    }

    fn report(&self) -> StageReport {
        self.base.report()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::{CategoryResolver, DEFAULT_CATEGORY_ID};
    use crate::model::{BillingCategory, UnitType};
    use crate::register::record::{AddressResolve, WorkingRecord};

    fn category(id: &str, name: &str, keywords: &[&str]) -> BillingCategory {
        BillingCategory {
            id: id.to_string(),
            name: name.to_string(),
            service_names: keywords.iter().map(ToString::to_string).collect::<BTreeSet<_>>(),
        }
    }

    fn resolver() -> CategoryResolver {
        CategoryResolver::with_categories(vec![
            category(DEFAULT_CATEGORY_ID, "Housing and utilities", &[]),
            category("water", "Water supply", &["cold water", "hot water"]),
            category("utilities", "Utilities", &["cold water", "hot water", "electricity"]),
            category("electricity", "Electricity", &["Electricity", "электроэнергия"]),
            category("parking", "Parking", &[]),
        ])
    }

    fn record(value: serde_json::Value) -> WorkingRecord {
        match WorkingRecord::new(0, value) {
            Ok(record) => record,
            Err(error) => panic!("fixture record is invalid: {error}"),
        }
    }

    #[test]
    fn no_services_yield_the_default_category() {
        assert_eq!(resolver().detect_category_by_services(&[]), DEFAULT_CATEGORY_ID);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            resolver().detect_category_by_services(&["ELECTRICITY".to_string()]),
            "electricity"
        );
    }

    // Order-dependent on purpose: both "water" and "utilities" cover the
    // services, and the later category in store order wins.
    #[test]
    fn last_matching_category_wins() {
        let services = vec!["Cold Water".to_string(), "hot water".to_string()];
        assert_eq!(resolver().detect_category_by_services(&services), "utilities");
    }

    #[test]
    fn uncovered_services_fall_back_to_default() {
        let services = vec!["cold water".to_string(), "security".to_string()];
        assert_eq!(
            resolver().detect_category_by_services(&services),
            DEFAULT_CATEGORY_ID
        );
    }

    #[test]
    fn declared_category_is_kept_unless_detection_is_forced() {
        let declared = record(json!({
            "category": "water",
            "services": [{ "name": "electricity" }]
        }));
        assert_eq!(resolver().resolve_record(&declared, false), Ok("water".to_string()));
        assert_eq!(
            resolver().resolve_record(&declared, true),
            Ok("electricity".to_string())
        );
    }

    #[test]
    fn unknown_declared_category_fails() {
        let declared = record(json!({ "category": "missing" }));
        assert!(resolver().resolve_record(&declared, false).is_err());
    }

    #[test]
    fn unit_type_picks_a_category_when_services_do_not() {
        let mut parking = record(json!({ "services": [{ "name": "maintenance" }] }));
        parking.set_address_resolve(AddressResolve {
            addresses: vec![],
            unit_name: "12".to_string(),
            unit_type: Some(UnitType::Parking),
        });
        assert_eq!(resolver().resolve_record(&parking, false), Ok("parking".to_string()));

        let mut warehouse = record(json!({}));
        warehouse.set_unit("3".to_string(), Some(UnitType::Warehouse));
        assert_eq!(
            resolver().resolve_record(&warehouse, false),
            Ok(DEFAULT_CATEGORY_ID.to_string())
        );
    }
}
