use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::model::{RawReceipt, UnitType};
use crate::register::errors::{ErrorCode, Problem, ProblemCode, RecordError};
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChosenAddress {
    pub address: String,
    pub address_key: String,
}

/// Outcome of matching a record's address candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyAddress {
    /// Key belongs to one of the organization's properties.
    Matched(ChosenAddress),
    /// Recognized, but outside the organization.
    Foreign(ChosenAddress),
    NotRecognized,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressResolve {
    pub addresses: Vec<String>,
    pub unit_name: String,
    pub unit_type: Option<UnitType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProperty {
    pub id: String,
    pub address_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccount {
    pub id: String,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedReceipt {
    pub id: String,
    #[serde(rename = "importId")]
    pub import_id: String,
}

/// A batch item plus everything the stages have resolved for it. Results can
/// be assigned or replaced, never cleared; the first error sticks.
#[derive(Debug, Clone)]
pub struct WorkingRecord {
    index: i64,
    raw: RawReceipt,
    original: Value,
    address_resolve: Option<AddressResolve>,
    property: Option<ResolvedProperty>,
    account: Option<ResolvedAccount>,
    category: Option<String>,
    receiver: Option<String>,
    period: Option<String>,
    receipt: Option<ResolvedReceipt>,
    problems: Vec<Problem>,
    error: Option<RecordError>,
}

impl WorkingRecord {
    pub fn new(index: i64, original: Value) -> Result<Self, serde_json::Error> {
        let raw = serde_json::from_value::<RawReceipt>(original.clone())?;
        Ok(Self::from_raw(index, raw, original))
    }

    pub fn from_raw(index: i64, raw: RawReceipt, original: Value) -> Self {
        Self {
            index,
            raw,
            original,
            address_resolve: None,
            property: None,
            account: None,
            category: None,
            receiver: None,
            period: None,
            receipt: None,
            problems: Vec::new(),
            error: None,
        }
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn raw(&self) -> &RawReceipt {
        &self.raw
    }

    pub fn original(&self) -> &Value {
        &self.original
    }

    pub fn address_resolve(&self) -> Option<&AddressResolve> {
        self.address_resolve.as_ref()
    }

    pub fn property(&self) -> Option<&ResolvedProperty> {
        self.property.as_ref()
    }

    pub fn account(&self) -> Option<&ResolvedAccount> {
        self.account.as_ref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn receiver(&self) -> Option<&str> {
        self.receiver.as_deref()
    }

    pub fn period(&self) -> Option<&str> {
        self.period.as_deref()
    }

    pub fn receipt(&self) -> Option<&ResolvedReceipt> {
        self.receipt.as_ref()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn error(&self) -> Option<&RecordError> {
        self.error.as_ref()
    }

    pub fn has_problem(&self, code: ProblemCode) -> bool {
        self.problems.iter().any(|problem| problem.code == code)
    }

    pub fn set_address_resolve(&mut self, resolve: AddressResolve) {
        self.address_resolve = Some(resolve);
    }

    /// Replaces the unit inferred from the address.
    pub fn set_unit(&mut self, unit_name: String, unit_type: Option<UnitType>) {
        let resolve = self.address_resolve.get_or_insert_with(AddressResolve::default);
        resolve.unit_name = unit_name;
        resolve.unit_type = unit_type;
    }

    pub fn set_property(&mut self, property: ResolvedProperty) {
        self.property = Some(property);
    }

    pub fn set_account(&mut self, account: ResolvedAccount) {
        self.account = Some(account);
    }

    pub fn set_category(&mut self, category_id: String) {
        self.category = Some(category_id);
    }

    pub fn set_receiver(&mut self, receiver_id: String) {
        self.receiver = Some(receiver_id);
    }

    pub fn set_period(&mut self, period: String) {
        self.period = Some(period);
    }

    pub fn set_receipt(&mut self, receipt: ResolvedReceipt) {
        self.receipt = Some(receipt);
    }

    pub fn add_problem(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    /// Records `error` unless an earlier stage already failed this record.
    pub fn fail(&mut self, error: RecordError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// Batch records keyed by their original index. Records that could not be
/// read at all are held apart with their error and never reach a stage.
#[derive(Debug, Clone, Default)]
pub struct ReceiptBatch {
    records: BTreeMap<i64, WorkingRecord>,
    rejected: BTreeMap<i64, RecordError>,
}

impl ReceiptBatch {
    pub fn from_values(values: Vec<(i64, Value)>) -> ClientResult<Self> {
        let mut batch = Self::default();
        for (index, value) in values {
            if batch.records.contains_key(&index) || batch.rejected.contains_key(&index) {
                return Err(ClientError::invalid_batch_format(
                    &format!("Record index {index} appears more than once."),
                    "duplicate_index",
                ));
            }
            if !value.is_object() {
                tracing::warn!(index, "record is not an object");
                batch
                    .rejected
                    .insert(index, RecordError::new(ErrorCode::MalformedRecord, index));
                continue;
            }
            match WorkingRecord::new(index, value) {
                Ok(record) => {
                    batch.records.insert(index, record);
                }
                Err(error) => {
                    tracing::warn!(index, %error, "record has malformed fields");
                    batch
                        .rejected
                        .insert(index, RecordError::new(ErrorCode::MalformedRecord, index));
                }
            }
        }
        Ok(batch)
    }

    /// Readable and rejected records together.
    pub fn record_count(&self) -> usize {
        self.records.len() + self.rejected.len()
    }

    pub fn rejected(&self) -> &BTreeMap<i64, RecordError> {
        &self.rejected
    }

    pub fn get_mut(&mut self, index: i64) -> Option<&mut WorkingRecord> {
        self.records.get_mut(&index)
    }

    pub fn records(&self) -> impl Iterator<Item = &WorkingRecord> {
        self.records.values()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut WorkingRecord> {
        self.records.values_mut()
    }
}
