use std::collections::{HashMap, HashSet};

use crate::model::{BillingAccount, UnitType, non_empty};
use crate::register::errors::{ErrorCode, ProblemCode};
use crate::register::payer::{AccountNumberCleaner, PayerClassifier, is_valid_account_global_id};
use crate::register::record::{ReceiptBatch, ResolvedAccount, ResolvedProperty, WorkingRecord};
use crate::register::resolver::{ResolveEnv, Resolver, ResolverBase, StageReport, StageResult};
use crate::store::{EntityKind, FieldSet};
use crate::{ClientError, ClientResult};

/// How an existing account was matched to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountMatch {
    /// Linked through an earlier receipt with the same import id.
    ReceiptImportId,
    SameProperty,
    /// The account's property left the organization and the record's
    /// property is owned; the account moves to it.
    MovedProperty,
    /// The record's property is foreign and the account's is owned; the
    /// record adopts the account's property and unit.
    AdoptedProperty,
}

pub struct AccountResolver {
    base: ResolverBase,
    cleaner: AccountNumberCleaner,
    classifier: PayerClassifier,
    accounts: Vec<BillingAccount>,
    property_keys: HashMap<String, String>,
    organization_keys: HashSet<String>,
    receipt_accounts: HashMap<String, String>,
    /// Account id to the property an earlier record of this batch settled on.
    claimed: HashMap<String, String>,
}

impl AccountResolver {
    pub fn new() -> ClientResult<Self> {
        Ok(Self {
            base: ResolverBase::new("account"),
            cleaner: AccountNumberCleaner::new()?,
            classifier: PayerClassifier::new()?,
            accounts: Vec::new(),
            property_keys: HashMap::new(),
            organization_keys: HashSet::new(),
            receipt_accounts: HashMap::new(),
            claimed: HashMap::new(),
        })
    }

    fn belongs_to_organization(&self, property_id: &str) -> bool {
        self.property_keys
            .get(property_id)
            .is_some_and(|key| self.organization_keys.contains(key))
    }

    fn claimed_elsewhere(&self, account_id: &str, property_id: &str) -> bool {
        self.claimed
            .get(account_id)
            .is_some_and(|claimed| claimed != property_id)
    }

    fn claim(&mut self, record: &mut WorkingRecord, account: &BillingAccount) {
        self.claimed
            .insert(account.id.clone(), account.property_id.clone());
        record.set_account(ResolvedAccount {
            id: account.id.clone(),
            number: account.number.clone(),
        });
    }

    /// Picks the existing account for a cleaned number, in priority order. A
    /// same-number account on another property only matches when exactly one
    /// of the two properties is owned by the organization.
    pub fn find_existing(
        &self,
        number: &str,
        property_id: &str,
        import_id: Option<&str>,
        property_is_foreign: bool,
    ) -> Option<(usize, AccountMatch)> {
        let by_receipt = import_id
            .and_then(|import_id| self.receipt_accounts.get(import_id))
            .and_then(|account_id| self.accounts.iter().position(|account| &account.id == account_id));
        if let Some(position) = by_receipt {
            return Some((position, AccountMatch::ReceiptImportId));
        }

        let same_property = self
            .accounts
            .iter()
            .position(|account| account.number == number && account.property_id == property_id);
        if let Some(position) = same_property {
            return Some((position, AccountMatch::SameProperty));
        }

        self.accounts
            .iter()
            .enumerate()
            .filter(|(_, account)| account.number == number)
            .find_map(|(position, account)| {
                let owned = self.belongs_to_organization(&account.property_id);
                if !owned && !property_is_foreign && !self.claimed_elsewhere(&account.id, property_id) {
                    Some((position, AccountMatch::MovedProperty))
                } else if owned && property_is_foreign {
                    Some((position, AccountMatch::AdoptedProperty))
                } else {
                    None
                }
            })
    }

    fn candidate_fields(
        &self,
        record: &WorkingRecord,
        number: &str,
        property_id: &str,
        creating: bool,
    ) -> FieldSet {
        let meta = &record.raw().account_meta;
        let global_id = non_empty(meta.global_id.as_deref()).filter(|id| is_valid_account_global_id(id));
        if global_id.is_none() && meta.global_id.is_some() {
            tracing::debug!(index = record.index(), "discarding invalid account global id");
        }
        let full_name = non_empty(meta.full_name.as_deref());
        let (unit_name, unit_type) = record
            .address_resolve()
            .map(|resolve| (resolve.unit_name.as_str(), resolve.unit_type))
            .unwrap_or_default();

        let mut fields = FieldSet::new()
            .text("number", Some(number))
            .reference("property", Some(property_id))
            .text("unit_name", Some(unit_name))
            .text("unit_type", Some(unit_type.unwrap_or(UnitType::Flat).as_str()))
            .text("global_id", global_id)
            .text("import_id", non_empty(meta.import_id.as_deref()))
            .text("full_name", full_name);
        if let Some(is_closed) = meta.is_closed {
            fields = fields.flag("is_closed", is_closed);
        } else if creating {
            fields = fields.flag("is_closed", false);
        }
        if full_name.is_some() || creating {
            fields = fields.text("owner_type", Some(self.classifier.classify(full_name).as_str()));
        }
        fields
    }

    fn resolve_record(&mut self, env: &ResolveEnv<'_>, record: &mut WorkingRecord) -> Result<(), String> {
        let number = self
            .cleaner
            .clean(record.raw().account_number.as_deref().unwrap_or_default());
        if number.is_empty() {
            return Err("account number is empty after cleanup".to_string());
        }
        let Some(property_id) = record.property().map(|property| property.id.clone()) else {
            return Ok(());
        };
        let import_id = record.raw().import_id.clone();
        let property_is_foreign = record.has_problem(ProblemCode::NoPropertyInOrganization);

        let existing = self.find_existing(&number, &property_id, import_id.as_deref(), property_is_foreign);
        let Some((position, matched)) = existing else {
            let fields = self.candidate_fields(record, &number, &property_id, true);
            let input = self.base.build_create_input(fields);
            let id = env
                .store
                .create(EntityKind::Account, env.context_id(), &input)
                .map_err(|error| error.to_string())?;
            self.base.mark_created();
            let created = env
                .store
                .get_account(&id)
                .map_err(|error| error.to_string())?
                .ok_or_else(|| format!("account `{id}` missing after create"))?;
            tracing::debug!(index = record.index(), account = %created.id, "account created");
            self.claim(record, &created);
            self.accounts.push(created);
            return Ok(());
        };

        let account = self.accounts[position].clone();
        let target_property = if matched == AccountMatch::AdoptedProperty {
            let address_key = self
                .property_keys
                .get(&account.property_id)
                .cloned()
                .unwrap_or_default();
            record.set_property(ResolvedProperty {
                id: account.property_id.clone(),
                address_key,
            });
            record.set_unit(account.unit_name.clone().unwrap_or_default(), account.unit_type);
            account.property_id.clone()
        } else {
            property_id
        };
        tracing::debug!(index = record.index(), account = %account.id, ?matched, "account matched");

        let fields = self.candidate_fields(record, &number, &target_property, false);
        let input = self.base.build_update_input(fields, &account);
        if input.is_empty() {
            self.claim(record, &account);
            return Ok(());
        }

        env.store
            .update(EntityKind::Account, &account.id, &input)
            .map_err(|error| error.to_string())?;
        let refreshed = env
            .store
            .get_account(&account.id)
            .map_err(|error| error.to_string())?
            .ok_or_else(|| format!("account `{}` vanished after update", account.id))?;
        self.claim(record, &refreshed);
        self.accounts[position] = refreshed;
        Ok(())
    }
}

impl Resolver for AccountResolver {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn init(&mut self, env: &ResolveEnv<'_>) -> ClientResult<()> {
        let unavailable =
            |error: ClientError| ClientError::reference_data_unavailable("account", &error.message);
        self.accounts = env.store.accounts(env.context_id()).map_err(unavailable)?;
        self.property_keys = env
            .store
            .properties(env.context_id())
            .map_err(unavailable)?
            .into_iter()
            .map(|property| (property.id, property.address_key))
            .collect();
        self.organization_keys = env
            .store
            .organization_properties(&env.context.organization.id)
            .map_err(unavailable)?
            .into_iter()
            .map(|property| property.address_key)
            .collect();
        self.receipt_accounts = env
            .store
            .receipt_import_links(env.context_id())
            .map_err(unavailable)?
            .into_iter()
            .collect();
        Ok(())
    }

    fn process_receipts(&mut self, env: &ResolveEnv<'_>, batch: &mut ReceiptBatch) -> StageResult {
        let mut result = StageResult::default();

        for record in batch.records_mut() {
            let index = record.index();
            if record.property().is_none() {
                continue;
            }
            match self.resolve_record(env, record) {
                Ok(()) => result.succeed(index),
                Err(cause) => {
                    result.fail(self.base.error(ErrorCode::AccountSaveFailed, index, &cause));
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
    use std::collections::{HashMap, HashSet};

    use super::{AccountMatch, AccountResolver};
    use crate::model::{BillingAccount, OwnerType, UnitType};

    fn account(id: &str, number: &str, property_id: &str) -> BillingAccount {
        BillingAccount {
            id: id.to_string(),
            number: number.to_string(),
            property_id: property_id.to_string(),
            unit_name: Some("1".to_string()),
            unit_type: Some(UnitType::Flat),
            global_id: None,
            import_id: None,
            full_name: None,
            is_closed: false,
            owner_type: OwnerType::Person,
        }
    }

    fn resolver() -> AccountResolver {
        let mut resolver = match AccountResolver::new() {
            Ok(resolver) => resolver,
            Err(error) => panic!("resolver failed to build: {error}"),
        };
        resolver.accounts = vec![
            account("acc_owned", "100", "prop_owned"),
            account("acc_gone", "200", "prop_gone"),
            account("acc_other", "300", "prop_owned"),
        ];
        resolver.property_keys = HashMap::from([
            ("prop_owned".to_string(), "owned-key".to_string()),
            ("prop_gone".to_string(), "gone-key".to_string()),
            ("prop_new".to_string(), "new-key".to_string()),
        ]);
        resolver.organization_keys = HashSet::from(["owned-key".to_string(), "new-key".to_string()]);
        resolver.receipt_accounts = HashMap::from([("imp-1".to_string(), "acc_other".to_string())]);
        resolver
    }

    #[test]
    fn receipt_import_id_wins_over_number() {
        assert_eq!(
            resolver().find_existing("100", "prop_owned", Some("imp-1"), false),
            Some((2, AccountMatch::ReceiptImportId))
        );
    }

    #[test]
    fn same_number_and_property_matches() {
        assert_eq!(
            resolver().find_existing("100", "prop_owned", Some("unknown"), false),
            Some((0, AccountMatch::SameProperty))
        );
    }

    #[test]
    fn account_moves_when_its_property_left_the_organization() {
        assert_eq!(
            resolver().find_existing("200", "prop_new", None, false),
            Some((1, AccountMatch::MovedProperty))
        );
    }

    #[test]
    fn foreign_record_property_adopts_the_account() {
        let resolver = resolver();
        assert_eq!(resolver.find_existing("100", "prop_new", None, false), None);
        assert_eq!(
            resolver.find_existing("100", "prop_new", None, true),
            Some((0, AccountMatch::AdoptedProperty))
        );
    }

    #[test]
    fn foreign_accounts_never_absorb_foreign_records() {
        let mut resolver = resolver();
        resolver.organization_keys.clear();
        assert_eq!(resolver.find_existing("200", "prop_new", None, true), None);
        assert_eq!(resolver.find_existing("100", "prop_new", None, true), None);
    }

    #[test]
    fn account_claimed_earlier_in_the_batch_does_not_move() {
        let mut resolver = resolver();
        resolver
            .claimed
            .insert("acc_gone".to_string(), "prop_gone".to_string());
        assert_eq!(resolver.find_existing("200", "prop_new", None, false), None);
        assert_eq!(
            resolver.find_existing("200", "prop_gone", None, false),
            Some((1, AccountMatch::SameProperty))
        );
    }

    #[test]
    fn unknown_number_creates() {
        assert_eq!(resolver().find_existing("999", "prop_owned", None, true), None);
    }
}
