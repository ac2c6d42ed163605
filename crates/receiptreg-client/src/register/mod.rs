pub mod account;
pub mod address;
pub mod category;
pub mod errors;
pub mod finder;
pub mod input;
pub mod parse;
pub mod payer;
pub mod period;
pub mod property;
pub mod receipt;
pub mod recipient;
pub mod record;
pub mod resolver;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ClientResult;
use crate::register::account::AccountResolver;
use crate::register::category::CategoryResolver;
use crate::register::errors::{Problem, RecordError};
use crate::register::period::PeriodResolver;
use crate::register::property::PropertyResolver;
use crate::register::receipt::ReceiptResolver;
use crate::register::recipient::RecipientResolver;
use crate::register::record::{ReceiptBatch, ResolvedReceipt};
use crate::register::resolver::{ResolveEnv, Resolver, StageReport};

/// Batch result keyed by original record index.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterOutcome {
    pub receipts: BTreeMap<i64, ResolvedReceipt>,
    pub error_receipts: BTreeMap<i64, RecordError>,
    pub problems: BTreeMap<i64, Vec<Problem>>,
    pub stages: Vec<StageReport>,
}

impl RegisterOutcome {
    fn collect(batch: &ReceiptBatch, stages: Vec<StageReport>) -> Self {
        let mut receipts = BTreeMap::new();
        let mut error_receipts = BTreeMap::new();
        let mut problems = BTreeMap::new();

        for (index, error) in batch.rejected() {
            error_receipts.insert(*index, error.clone());
        }
        for record in batch.records() {
            if let Some(error) = record.error() {
                error_receipts.insert(record.index(), error.clone());
            } else if let Some(receipt) = record.receipt() {
                receipts.insert(record.index(), receipt.clone());
            }
            if !record.problems().is_empty() {
                problems.insert(record.index(), record.problems().to_vec());
            }
        }

        Self {
            receipts,
            error_receipts,
            problems,
            stages,
        }
    }
}

fn run_stage(
    env: &ResolveEnv<'_>,
    batch: &mut ReceiptBatch,
    stage: &mut dyn Resolver,
) -> ClientResult<StageReport> {
    stage.init(env)?;
    let result = stage.process_receipts(env, batch);
    for (index, error) in result.error_receipts {
        if let Some(record) = batch.get_mut(index) {
            record.fail(error);
        }
    }

    let report = stage.report();
    tracing::info!(
        stage = report.stage,
        resolved = result.receipts.len(),
        created = report.created,
        updated = report.updated,
        untouched = report.untouched,
        failed = report.failed,
        elapsed_ms = report.elapsed_ms,
        "stage finished"
    );
    Ok(report)
}

/// Runs every stage over the batch in dependency order. Per-record failures
/// land in the outcome; only structural failures return `Err`.
pub fn register_receipts(
    env: &ResolveEnv<'_>,
    batch: &mut ReceiptBatch,
) -> ClientResult<RegisterOutcome> {
    tracing::info!(context = env.context_id(), records = batch.record_count(), "registering receipts");

    let stages = vec![
        run_stage(env, batch, &mut PeriodResolver::new())?,
        run_stage(env, batch, &mut PropertyResolver::new(env.context))?,
        run_stage(env, batch, &mut AccountResolver::new()?)?,
        run_stage(env, batch, &mut CategoryResolver::new())?,
        run_stage(env, batch, &mut RecipientResolver::new())?,
        run_stage(env, batch, &mut ReceiptResolver::new())?,
    ];

    Ok(RegisterOutcome::collect(batch, stages))
}
