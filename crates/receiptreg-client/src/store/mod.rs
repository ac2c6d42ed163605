pub mod sqlite;

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::ClientResult;
use crate::model::{
    BillingAccount, BillingCategory, BillingProperty, BillingReceipt, BillingRecipient,
    OrganizationProperty,
};

pub use sqlite::SqliteStore;

pub const SENDER_FINGERPRINT: &str = "receipt-registration";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Account,
    Property,
    Recipient,
    Receipt,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Account => "account",
            EntityKind::Property => "property",
            EntityKind::Recipient => "recipient",
            EntityKind::Receipt => "receipt",
        }
    }

    pub(crate) fn table(self) -> &'static str {
        match self {
            EntityKind::Account => "billing_accounts",
            EntityKind::Property => "billing_properties",
            EntityKind::Recipient => "billing_recipients",
            EntityKind::Receipt => "billing_receipts",
        }
    }

    pub(crate) fn id_prefix(self) -> &'static str {
        match self {
            EntityKind::Account => "acc",
            EntityKind::Property => "prop",
            EntityKind::Recipient => "rcp",
            EntityKind::Receipt => "rct",
        }
    }

    pub(crate) fn writable_columns(self) -> &'static [&'static str] {
        match self {
            EntityKind::Account => &[
                "number",
                "property_id",
                "unit_name",
                "unit_type",
                "global_id",
                "import_id",
                "full_name",
                "is_closed",
                "owner_type",
            ],
            EntityKind::Property => &["address", "address_key", "import_id", "global_id"],
            EntityKind::Recipient => &[
                "name",
                "bank_name",
                "bank_account",
                "tin",
                "iec",
                "bic",
                "offsetting_account",
                "territory_code",
                "is_approved",
            ],
            EntityKind::Receipt => &[
                "account_id",
                "property_id",
                "category_id",
                "receiver_id",
                "period",
                "to_pay",
                "to_pay_details",
                "services",
                "import_id",
                "raw",
                "balance_updated_at",
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    Json(Value),
    Set(BTreeSet<String>),
}

/// A named field of an entity. References point at another entity by id and
/// are stored in the `<name>_id` column.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(&'static str, FieldValue),
    Reference(&'static str, String),
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Value(name, _) | Field::Reference(name, _) => name,
        }
    }

    pub(crate) fn column(&self) -> String {
        match self {
            Field::Value(name, _) => (*name).to_string(),
            Field::Reference(name, _) => format!("{name}_id"),
        }
    }
}

/// Collects present fields, silently dropping absent and empty values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: Vec<Field>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &'static str, value: Option<&str>) -> Self {
        if let Some(text) = value.filter(|text| !text.is_empty()) {
            self.fields
                .push(Field::Value(name, FieldValue::Text(text.to_string())));
        }
        self
    }

    pub fn flag(mut self, name: &'static str, value: bool) -> Self {
        self.fields.push(Field::Value(name, FieldValue::Flag(value)));
        self
    }

    pub fn json(mut self, name: &'static str, value: Option<&Value>) -> Self {
        if let Some(json) = value.filter(|json| !json.is_null()) {
            self.fields
                .push(Field::Value(name, FieldValue::Json(json.clone())));
        }
        self
    }

    pub fn set(mut self, name: &'static str, values: &BTreeSet<String>) -> Self {
        if !values.is_empty() {
            self.fields
                .push(Field::Value(name, FieldValue::Set(values.clone())));
        }
        self
    }

    pub fn reference(mut self, name: &'static str, id: Option<&str>) -> Self {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            self.fields.push(Field::Reference(name, id.to_string()));
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sender {
    pub dv: u8,
    pub fingerprint: String,
}

impl Default for Sender {
    fn default() -> Self {
        Self {
            dv: 1,
            fingerprint: SENDER_FINGERPRINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateInput {
    pub fields: Vec<Field>,
    pub sender: Sender,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateInput {
    pub fields: Vec<Field>,
    pub sender: Sender,
}

impl UpdateInput {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn touches(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.name() == name)
    }
}

/// Field list of a persisted entity, used as the baseline for update diffs.
pub trait Entity {
    fn id(&self) -> &str;
    fn fields(&self) -> FieldSet;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptQuery<'a> {
    All,
    ByImportId(&'a str),
    /// Same period and account, confirmed by either receiver or category.
    ByPeriodAccount {
        period: &'a str,
        account_id: &'a str,
        receiver_id: Option<&'a str>,
        category_id: Option<&'a str>,
    },
}

/// Persistence API the resolvers read from and write to. Every finder is
/// scoped to one billing context and skips soft-deleted rows.
pub trait Store {
    fn organization_properties(&self, organization_id: &str)
    -> ClientResult<Vec<OrganizationProperty>>;
    fn add_organization_property(
        &self,
        organization_id: &str,
        address: &str,
        address_key: &str,
    ) -> ClientResult<OrganizationProperty>;
    fn categories(&self) -> ClientResult<Vec<BillingCategory>>;
    fn accounts(&self, context_id: &str) -> ClientResult<Vec<BillingAccount>>;
    fn properties(&self, context_id: &str) -> ClientResult<Vec<BillingProperty>>;
    fn recipients(&self, context_id: &str) -> ClientResult<Vec<BillingRecipient>>;
    fn receipts(&self, context_id: &str, query: &ReceiptQuery<'_>)
    -> ClientResult<Vec<BillingReceipt>>;
    /// `(import_id, account_id)` for every receipt that carries an import id.
    fn receipt_import_links(&self, context_id: &str) -> ClientResult<Vec<(String, String)>>;
    fn get_account(&self, id: &str) -> ClientResult<Option<BillingAccount>>;
    fn get_property(&self, id: &str) -> ClientResult<Option<BillingProperty>>;
    fn get_recipient(&self, id: &str) -> ClientResult<Option<BillingRecipient>>;
    fn get_receipt(&self, id: &str) -> ClientResult<Option<BillingReceipt>>;
    fn create(&self, kind: EntityKind, context_id: &str, input: &CreateInput)
    -> ClientResult<String>;
    fn update(&self, kind: EntityKind, id: &str, input: &UpdateInput) -> ClientResult<()>;
}

impl Entity for BillingAccount {
    fn id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> FieldSet {
        FieldSet::new()
            .text("number", Some(&self.number))
            .reference("property", Some(&self.property_id))
            .text("unit_name", self.unit_name.as_deref())
            .text("unit_type", self.unit_type.map(|unit_type| unit_type.as_str()))
            .text("global_id", self.global_id.as_deref())
            .text("import_id", self.import_id.as_deref())
            .text("full_name", self.full_name.as_deref())
            .flag("is_closed", self.is_closed)
            .text("owner_type", Some(self.owner_type.as_str()))
    }
}

impl Entity for BillingProperty {
    fn id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> FieldSet {
        FieldSet::new()
            .text("address", Some(&self.address))
            .text("address_key", Some(&self.address_key))
            .text("import_id", self.import_id.as_deref())
            .text("global_id", self.global_id.as_deref())
    }
}

impl Entity for BillingRecipient {
    fn id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> FieldSet {
        FieldSet::new()
            .text("name", self.name.as_deref())
            .text("bank_name", self.bank_name.as_deref())
            .text("bank_account", Some(&self.bank_account))
            .text("tin", self.tin.as_deref())
            .text("iec", self.iec.as_deref())
            .text("bic", self.bic.as_deref())
            .text("offsetting_account", self.offsetting_account.as_deref())
            .text("territory_code", self.territory_code.as_deref())
            .flag("is_approved", self.is_approved)
    }
}

impl Entity for BillingReceipt {
    fn id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> FieldSet {
        FieldSet::new()
            .reference("account", Some(&self.account_id))
            .reference("property", self.property_id.as_deref())
            .reference("category", self.category_id.as_deref())
            .reference("receiver", self.receiver_id.as_deref())
            .text("period", Some(&self.period))
            .text("to_pay", self.to_pay.as_deref())
            .json("to_pay_details", self.to_pay_details.as_ref())
            .json("services", self.services.as_ref())
            .text("import_id", self.import_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::{Value, json};

    use super::{Field, FieldSet, FieldValue};

    #[test]
    fn field_set_drops_absent_and_empty_values() {
        let fields = FieldSet::new()
            .text("name", Some(""))
            .text("tin", None)
            .text("bank_account", Some("40702810000000000001"))
            .json("details", Some(&Value::Null))
            .set("service_names", &BTreeSet::new())
            .reference("property", Some(""))
            .reference("account", Some("acc_1"))
            .into_fields();

        assert_eq!(
            fields,
            vec![
                Field::Value(
                    "bank_account",
                    FieldValue::Text("40702810000000000001".to_string())
                ),
                Field::Reference("account", "acc_1".to_string()),
            ]
        );
    }

    #[test]
    fn references_map_to_id_columns() {
        let fields = FieldSet::new()
            .reference("receiver", Some("rcp_1"))
            .json("services", Some(&json!([])))
            .into_fields();
        let columns: Vec<String> = fields.iter().map(Field::column).collect();
        assert_eq!(columns, vec!["receiver_id".to_string(), "services".to_string()]);
    }
}
