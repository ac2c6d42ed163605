use serde::Serialize;

use crate::model::{BillingCategory, BillingProperty, BillingReceipt, OrganizationProperty};
use crate::register::RegisterOutcome;

#[derive(Debug, Clone, Serialize)]
pub struct StoreContext {
    pub db_path: String,
    pub schema_version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterSummary {
    pub records: usize,
    pub registered: usize,
    pub failed: usize,
    pub with_problems: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterData {
    pub context_id: String,
    pub source_kind: String,
    pub source_ref: Option<String>,
    pub summary: RegisterSummary,
    #[serde(flatten)]
    pub outcome: RegisterOutcome,
    pub store: StoreContext,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptListData {
    pub context_id: String,
    pub receipts: Vec<BillingReceipt>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyAddData {
    pub organization_id: String,
    pub property: OrganizationProperty,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyListData {
    pub context_id: String,
    pub organization_id: String,
    pub organization_properties: Vec<OrganizationProperty>,
    pub billing_properties: Vec<BillingProperty>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryListData {
    pub categories: Vec<BillingCategory>,
}
