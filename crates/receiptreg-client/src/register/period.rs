use chrono::Datelike;
use serde_json::Value;

use crate::ClientResult;
use crate::register::errors::ErrorCode;
use crate::register::record::ReceiptBatch;
use crate::register::resolver::{ResolveEnv, Resolver, ResolverBase, StageReport, StageResult};

pub struct PeriodResolver {
    base: ResolverBase,
}

impl PeriodResolver {
    pub fn new() -> Self {
        Self {
            base: ResolverBase::new("period"),
        }
    }
}

impl Default for PeriodResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Integer from a JSON number or a numeric string; anything else is absent.
fn integer_value(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Validates month then year and returns the `YYYY-MM-01` period.
///
/// Month `0` is accepted; upstream exports have historically sent it.
pub fn validate_period(
    month: Option<&Value>,
    year: Option<&Value>,
    current_year: i32,
    year_tolerance: i32,
) -> Result<String, ErrorCode> {
    let month = integer_value(month)
        .filter(|month| (0..=12).contains(month))
        .ok_or(ErrorCode::WrongMonth)?;
    let year = integer_value(year)
        .filter(|year| (year - i64::from(current_year)).abs() <= i64::from(year_tolerance))
        .ok_or(ErrorCode::WrongYear)?;
    Ok(format!("{year:04}-{month:02}-01"))
}

impl Resolver for PeriodResolver {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn init(&mut self, _env: &ResolveEnv<'_>) -> ClientResult<()> {
        Ok(())
    }

    fn process_receipts(&mut self, env: &ResolveEnv<'_>, batch: &mut ReceiptBatch) -> StageResult {
        let current_year = env.now.year();
        let tolerance = env.context.pipeline.year_tolerance;
        let mut result = StageResult::default();

        for record in batch.records_mut() {
            let index = record.index();
            let raw = record.raw();
            match validate_period(raw.month.as_ref(), raw.year.as_ref(), current_year, tolerance) {
                Ok(period) => {
                    tracing::debug!(index, %period, "period resolved");
                    record.set_period(period);
                    result.succeed(index);
                }
                Err(code) => {
                    let cause = format!("month={:?} year={:?}", raw.month, raw.year);
                    result.fail(self.base.error(code, index, &cause));
                }
            }
        }

        result
    }

    fn report(&self) -> StageReport {
        self.base.report()
    }
}
