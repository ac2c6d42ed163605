use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::ClientResult;
use crate::config::BillingContext;
use crate::register::errors::{ErrorCode, RecordError};
use crate::register::record::ReceiptBatch;
use crate::services::{AddressService, BankLookup, OrganizationLookup};
use crate::store::{CreateInput, Entity, Field, FieldSet, Sender, Store, UpdateInput};

/// Everything a stage may talk to while resolving one batch.
pub struct ResolveEnv<'a> {
    pub context: &'a BillingContext,
    pub now: DateTime<Utc>,
    pub store: &'a dyn Store,
    pub address_service: &'a dyn AddressService,
    pub bank_lookup: &'a dyn BankLookup,
    pub organization_lookup: &'a dyn OrganizationLookup,
}

impl ResolveEnv<'_> {
    pub fn context_id(&self) -> &str {
        &self.context.id
    }

    pub fn now_timestamp(&self) -> String {
        self.now.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RunStats {
    pub created: usize,
    pub updated: usize,
    pub untouched: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: &'static str,
    pub created: usize,
    pub updated: usize,
    pub untouched: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

/// Per-stage outcome keyed by original record index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageResult {
    pub receipts: Vec<i64>,
    pub error_receipts: BTreeMap<i64, RecordError>,
}

impl StageResult {
    pub fn succeed(&mut self, index: i64) {
        self.receipts.push(index);
    }

    pub fn fail(&mut self, error: RecordError) {
        self.error_receipts.insert(error.index, error);
    }
}

pub trait Resolver {
    fn name(&self) -> &'static str;

    /// Loads context-scoped reference data. Safe to call more than once.
    fn init(&mut self, env: &ResolveEnv<'_>) -> ClientResult<()>;

    fn process_receipts(&mut self, env: &ResolveEnv<'_>, batch: &mut ReceiptBatch)
    -> StageResult;

    fn report(&self) -> StageReport;
}

/// Shared bookkeeping for every stage: upsert inputs, run statistics and
/// per-record error wrapping.
#[derive(Debug)]
pub struct ResolverBase {
    name: &'static str,
    sender: Sender,
    stats: RunStats,
    failed: usize,
    started: Instant,
}

impl ResolverBase {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            sender: Sender::default(),
            stats: RunStats::default(),
            failed: 0,
            started: Instant::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn build_create_input(&self, fields: FieldSet) -> CreateInput {
        CreateInput {
            fields: fields.into_fields(),
            sender: self.sender.clone(),
        }
    }

    /// Counts a create once the store has accepted it.
    pub fn mark_created(&mut self) {
        self.stats.created += 1;
    }

    /// Keeps only the candidate fields that differ from `existing`. An empty
    /// result means nothing changed.
    pub fn build_update_input<E: Entity>(&mut self, fields: FieldSet, existing: &E) -> UpdateInput {
        let current = existing.fields();
        let changed: Vec<Field> = fields
            .into_fields()
            .into_iter()
            .filter(|field| current.get(field.name()) != Some(field))
            .collect();

        if changed.is_empty() {
            self.stats.untouched += 1;
        } else {
            self.stats.updated += 1;
        }
        UpdateInput {
            fields: changed,
            sender: self.sender.clone(),
        }
    }

    pub fn error(&mut self, code: ErrorCode, index: i64, cause: &dyn Display) -> RecordError {
        self.failed += 1;
        tracing::error!(stage = self.name, index, code = code.as_str(), %cause, "record failed");
        RecordError::new(code, index)
    }

    pub fn report(&self) -> StageReport {
        StageReport {
            stage: self.name,
            created: self.stats.created,
            updated: self.stats.updated,
            untouched: self.stats.untouched,
            failed: self.failed,
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}
