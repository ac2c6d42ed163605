use std::collections::BTreeSet;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Flat,
    Parking,
    Warehouse,
    Commercial,
    Apartment,
}

impl UnitType {
    pub const ALL: [UnitType; 5] = [
        UnitType::Flat,
        UnitType::Parking,
        UnitType::Warehouse,
        UnitType::Commercial,
        UnitType::Apartment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UnitType::Flat => "flat",
            UnitType::Parking => "parking",
            UnitType::Warehouse => "warehouse",
            UnitType::Commercial => "commercial",
            UnitType::Apartment => "apartment",
        }
    }

    /// Exact match on the canonical lowercase name.
    pub fn from_name(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|unit_type| unit_type.as_str() == value)
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    Person,
    Company,
}

impl OwnerType {
    pub fn as_str(self) -> &'static str {
        match self {
            OwnerType::Person => "person",
            OwnerType::Company => "company",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "person" => Some(OwnerType::Person),
            "company" => Some(OwnerType::Company),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationProperty {
    pub id: String,
    pub organization_id: String,
    pub address: String,
    pub address_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingProperty {
    pub id: String,
    pub address: String,
    pub address_key: String,
    pub import_id: Option<String>,
    pub global_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingAccount {
    pub id: String,
    pub number: String,
    pub property_id: String,
    pub unit_name: Option<String>,
    pub unit_type: Option<UnitType>,
    pub global_id: Option<String>,
    pub import_id: Option<String>,
    pub full_name: Option<String>,
    pub is_closed: bool,
    pub owner_type: OwnerType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingCategory {
    pub id: String,
    pub name: String,
    pub service_names: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingRecipient {
    pub id: String,
    pub name: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account: String,
    pub tin: Option<String>,
    pub iec: Option<String>,
    pub bic: Option<String>,
    pub offsetting_account: Option<String>,
    pub territory_code: Option<String>,
    pub is_approved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingReceipt {
    pub id: String,
    pub account_id: String,
    pub property_id: Option<String>,
    pub category_id: Option<String>,
    pub receiver_id: Option<String>,
    pub period: String,
    pub to_pay: Option<String>,
    pub to_pay_details: Option<Value>,
    pub services: Option<Value>,
    pub import_id: Option<String>,
    pub balance_updated_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountMeta {
    #[serde(deserialize_with = "lenient_string")]
    pub global_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub import_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub full_name: Option<String>,
    pub is_closed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressMeta {
    #[serde(deserialize_with = "lenient_string")]
    pub global_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub import_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub unit_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub unit_type: Option<String>,
}

/// One loosely-typed input record as delivered by an upstream parser.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawReceipt {
    #[serde(deserialize_with = "lenient_string")]
    pub account_number: Option<String>,
    pub account_meta: AccountMeta,
    #[serde(deserialize_with = "lenient_string")]
    pub address: Option<String>,
    pub address_meta: AddressMeta,
    pub month: Option<Value>,
    pub year: Option<Value>,
    #[serde(deserialize_with = "lenient_list")]
    pub services: Vec<Value>,
    #[serde(deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub tin: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub routing_number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub bank_account: Option<String>,
    pub to_pay: Option<Value>,
    pub to_pay_details: Option<Value>,
    #[serde(deserialize_with = "lenient_string")]
    pub import_id: Option<String>,
}

impl RawReceipt {
    /// Service names as given, skipping entries without a usable name.
    pub fn service_names(&self) -> Vec<String> {
        self.services
            .iter()
            .filter_map(|service| service.get("name").and_then(Value::as_str))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

/// Accepts numbers where identifiers are expected; upstream exports often
/// emit account and bank numbers unquoted.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

/// Anything but an array reads as no services.
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{RawReceipt, UnitType};

    #[test]
    fn raw_receipt_reads_camel_case_fields() {
        let parsed: Result<RawReceipt, _> = serde_json::from_value(json!({
            "accountNumber": "лс 20-I-1",
            "address": "ул.Ленина, д.5",
            "addressMeta": { "unitName": "12", "importId": "p-1" },
            "month": 3,
            "year": 2023,
            "services": [{ "name": "Electricity" }, { "toPay": "1.00" }],
            "bankAccount": "40702810000000000001",
            "routingNumber": 44525225
        }));
        assert!(parsed.is_ok());
        if let Ok(receipt) = parsed {
            assert_eq!(receipt.account_number.as_deref(), Some("лс 20-I-1"));
            assert_eq!(receipt.address_meta.unit_name.as_deref(), Some("12"));
            assert_eq!(receipt.service_names(), vec!["Electricity".to_string()]);
            assert!(receipt.account_meta.global_id.is_none());
            assert_eq!(receipt.routing_number.as_deref(), Some("44525225"));
        }
    }

    #[test]
    fn scalar_fields_tolerate_numbers_and_odd_service_shapes() {
        let parsed: Result<RawReceipt, _> = serde_json::from_value(json!({
            "accountNumber": 20,
            "address": 123,
            "addressMeta": { "unitName": 12, "unitType": "flat" },
            "category": 5,
            "services": "x"
        }));
        assert!(parsed.is_ok());
        if let Ok(receipt) = parsed {
            assert_eq!(receipt.address.as_deref(), Some("123"));
            assert_eq!(receipt.address_meta.unit_name.as_deref(), Some("12"));
            assert_eq!(receipt.category.as_deref(), Some("5"));
            assert!(receipt.services.is_empty());
        }

        let nested: Result<RawReceipt, _> =
            serde_json::from_value(json!({ "addressMeta": { "unitName": ["12"] } }));
        assert!(nested.is_err());
    }

    #[test]
    fn unit_type_names_are_exact() {
        assert_eq!(UnitType::from_name("parking"), Some(UnitType::Parking));
        assert_eq!(UnitType::from_name("Parking"), None);
        assert_eq!(UnitType::Warehouse.to_string(), "warehouse");
    }
}
