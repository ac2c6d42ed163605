use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

use crate::ClientResult;
use crate::model::{BillingReceipt, non_empty};
use crate::register::errors::ErrorCode;
use crate::register::record::{ReceiptBatch, ResolvedReceipt, WorkingRecord};
use crate::register::resolver::{ResolveEnv, Resolver, ResolverBase, StageReport, StageResult};
use crate::store::{EntityKind, Field, FieldSet, FieldValue, ReceiptQuery};

const MONEY_DETAIL_FIELDS: [&str; 6] = [
    "charge",
    "balance",
    "recalculation",
    "privilege",
    "penalty",
    "paid",
];

/// Two-decimal amount, midpoint rounded away from zero. Accepts JSON numbers
/// and numeric strings with either decimal separator.
pub fn normalize_money(value: &Value) -> Option<String> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().replace(',', "."),
        _ => return None,
    };
    let amount = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()?;
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    Some(rounded.to_string())
}

fn normalize_money_fields(details: &Value, fields: &[&str]) -> Value {
    let Value::Object(map) = details else {
        return details.clone();
    };
    let mut normalized = map.clone();
    for field in fields {
        if let Some(amount) = map.get(*field).and_then(normalize_money) {
            normalized.insert((*field).to_string(), Value::String(amount));
        }
    }
    Value::Object(normalized)
}

pub fn normalize_details(details: &Value) -> Value {
    normalize_money_fields(details, &MONEY_DETAIL_FIELDS)
}

pub fn normalize_services(services: &[Value]) -> Value {
    Value::Array(
        services
            .iter()
            .map(|service| {
                let mut normalized = normalize_money_fields(service, &["toPay"]);
                if let Some(details) = normalized.get("toPayDetails").map(normalize_details) {
                    normalized["toPayDetails"] = details;
                }
                normalized
            })
            .collect(),
    )
}

/// Key of a receipt that arrived without an import id.
pub fn synthesize_import_id(
    account_number: &str,
    address_key: &str,
    period: &str,
    receiver_id: Option<&str>,
    category_id: Option<&str>,
) -> String {
    [
        account_number,
        address_key,
        period,
        receiver_id.unwrap_or_default(),
        category_id.unwrap_or_default(),
    ]
    .join("_")
}

fn paid(details: Option<&Value>) -> Option<&Value> {
    details.and_then(|details| details.get("paid"))
}

pub struct ReceiptResolver {
    base: ResolverBase,
}

impl ReceiptResolver {
    pub fn new() -> Self {
        Self {
            base: ResolverBase::new("receipt"),
        }
    }

    fn resolve_record(&mut self, env: &ResolveEnv<'_>, record: &WorkingRecord) -> Result<ResolvedReceipt, String> {
        let (Some(period), Some(account)) = (record.period(), record.account()) else {
            return Err("period or account missing".to_string());
        };
        let raw = record.raw();
        let address_key = record
            .property()
            .map(|property| property.address_key.as_str())
            .unwrap_or_default();
        let import_id = match non_empty(raw.import_id.as_deref()) {
            Some(import_id) => import_id.to_string(),
            None => synthesize_import_id(
                &account.number,
                address_key,
                period,
                record.receiver(),
                record.category(),
            ),
        };

        let query = if non_empty(raw.import_id.as_deref()).is_some() {
            ReceiptQuery::ByImportId(&import_id)
        } else {
            ReceiptQuery::ByPeriodAccount {
                period,
                account_id: &account.id,
                receiver_id: record.receiver(),
                category_id: record.category(),
            }
        };
        let found = env
            .store
            .receipts(env.context_id(), &query)
            .map_err(|error| error.to_string())?;
        let existing = found
            .iter()
            .find(|receipt| receipt.import_id.as_deref() == Some(import_id.as_str()))
            .or_else(|| found.first());

        let to_pay = raw.to_pay.as_ref().and_then(normalize_money);
        if raw.to_pay.as_ref().is_some_and(|value| !value.is_null()) && to_pay.is_none() {
            tracing::warn!(index = record.index(), "ignoring non-numeric toPay");
        }
        let to_pay_details = raw.to_pay_details.as_ref().map(normalize_details);
        let services = normalize_services(&raw.services);

        let fields = FieldSet::new()
            .reference("account", Some(&account.id))
            .reference("property", record.property().map(|property| property.id.as_str()))
            .reference("category", record.category())
            .reference("receiver", record.receiver())
            .text("period", Some(period))
            .text("to_pay", to_pay.as_deref())
            .json("to_pay_details", to_pay_details.as_ref())
            .json("services", Some(&services));

        match existing {
            Some(receipt) => self.update(env, receipt, fields, to_pay_details.as_ref()),
            None => {
                let input = self.base.build_create_input(
                    fields
                        .text("import_id", Some(&import_id))
                        .json("raw", Some(record.original()))
                        .text("balance_updated_at", Some(&env.now_timestamp())),
                );
                let id = env
                    .store
                    .create(EntityKind::Receipt, env.context_id(), &input)
                    .map_err(|error| error.to_string())?;
                self.base.mark_created();
                tracing::debug!(index = record.index(), receipt = %id, "receipt created");
                Ok(ResolvedReceipt { id, import_id })
            }
        }
    }

    fn update(
        &mut self,
        env: &ResolveEnv<'_>,
        receipt: &BillingReceipt,
        fields: FieldSet,
        to_pay_details: Option<&Value>,
    ) -> Result<ResolvedReceipt, String> {
        let mut input = self.base.build_update_input(fields, receipt);
        let resolved = ResolvedReceipt {
            id: receipt.id.clone(),
            import_id: receipt.import_id.clone().unwrap_or_default(),
        };
        if input.is_empty() {
            return Ok(resolved);
        }

        let paid_changed = input.touches("to_pay_details")
            && paid(to_pay_details) != paid(receipt.to_pay_details.as_ref());
        if input.touches("to_pay") || paid_changed {
            input.fields.push(Field::Value(
                "balance_updated_at",
                FieldValue::Text(env.now_timestamp()),
            ));
        }
        env.store
            .update(EntityKind::Receipt, &receipt.id, &input)
            .map_err(|error| error.to_string())?;
        Ok(resolved)
    }
}

impl Default for ReceiptResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for ReceiptResolver {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn init(&mut self, _env: &ResolveEnv<'_>) -> ClientResult<()> {
        Ok(())
    }

    fn process_receipts(&mut self, env: &ResolveEnv<'_>, batch: &mut ReceiptBatch) -> StageResult {
        let mut result = StageResult::default();

        for record in batch.records_mut() {
            let index = record.index();
            if record.error().is_some() || record.period().is_none() || record.account().is_none() {
                continue;
            }
            match self.resolve_record(env, record) {
                Ok(receipt) => {
                    record.set_receipt(receipt);
                    result.succeed(index);
                }
                Err(cause) => {
                    result.fail(self.base.error(ErrorCode::ReceiptSaveFailed, index, &cause));
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
    use serde_json::json;

    use super::{normalize_details, normalize_money, normalize_services, synthesize_import_id};

    #[test]
    fn money_is_rounded_half_away_from_zero() {
        assert_eq!(normalize_money(&json!(10)), Some("10.00".to_string()));
        assert_eq!(normalize_money(&json!("1.005")), Some("1.01".to_string()));
        assert_eq!(normalize_money(&json!("-1.005")), Some("-1.01".to_string()));
        assert_eq!(normalize_money(&json!(" 12,5 ")), Some("12.50".to_string()));
        assert_eq!(normalize_money(&json!(2.344)), Some("2.34".to_string()));
        assert_eq!(normalize_money(&json!("n/a")), None);
        assert_eq!(normalize_money(&json!(null)), None);
    }

    #[test]
    fn details_normalize_only_money_fields() {
        let details = normalize_details(&json!({
            "charge": 100.1,
            "paid": "50",
            "formula": "tariff * volume",
            "note": "0.123"
        }));
        assert_eq!(details["charge"], json!("100.10"));
        assert_eq!(details["paid"], json!("50.00"));
        assert_eq!(details["formula"], json!("tariff * volume"));
        assert_eq!(details["note"], json!("0.123"));
    }

    #[test]
    fn service_amounts_are_normalized() {
        let services = normalize_services(&[
            json!({ "name": "Electricity", "toPay": 1.5, "toPayDetails": { "charge": "1.499" } }),
            json!({ "name": "Water" }),
        ]);
        assert_eq!(
            services,
            json!([
                { "name": "Electricity", "toPay": "1.50", "toPayDetails": { "charge": "1.50" } },
                { "name": "Water" }
            ])
        );
    }

    #[test]
    fn synthesized_import_id_joins_the_uniqueness_key() {
        assert_eq!(
            synthesize_import_id("20-I-1", "ленина-5", "2023-03-01", None, Some("cat")),
            "20-I-1_ленина-5_2023-03-01__cat"
        );
    }
}
