use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::ClientResult;
use crate::commands::common::{open_store, store_context};
use crate::config::load_context;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{RegisterData, RegisterSummary};
use crate::register::input::resolve_source;
use crate::register::parse::parse_batch;
use crate::register::record::ReceiptBatch;
use crate::register::register_receipts;
use crate::register::resolver::ResolveEnv;
use crate::services::{LocalAddressService, LocalDirectory};

#[derive(Debug)]
pub struct RegisterOptions<'a> {
    pub path: String,
    pub context_path: PathBuf,
    pub home_override: Option<&'a Path>,
    pub stdin_override: Option<String>,
    /// Clock override; defaults to the current time.
    pub now: Option<DateTime<Utc>>,
}

pub fn run(path: String, context_path: PathBuf) -> ClientResult<SuccessEnvelope> {
    run_with_options(RegisterOptions {
        path,
        context_path,
        home_override: None,
        stdin_override: None,
        now: None,
    })
}

#[doc(hidden)]
pub fn run_with_options(options: RegisterOptions<'_>) -> ClientResult<SuccessEnvelope> {
    let context = load_context(&options.context_path)?;
    let source = resolve_source(&options.path, options.stdin_override)?;
    let mut batch = ReceiptBatch::from_values(parse_batch(&source.content)?)?;
    let (setup, store) = open_store(options.home_override)?;

    let directory = LocalDirectory::from_directory(&context.directory);
    let env = ResolveEnv {
        context: &context,
        now: options.now.unwrap_or_else(Utc::now),
        store: &store,
        address_service: &LocalAddressService,
        bank_lookup: &directory,
        organization_lookup: &directory,
    };
    let outcome = register_receipts(&env, &mut batch)?;

    let summary = RegisterSummary {
        records: batch.record_count(),
        registered: outcome.receipts.len(),
        failed: outcome.error_receipts.len(),
        with_problems: outcome.problems.len(),
    };
    let data = RegisterData {
        context_id: context.id.clone(),
        source_kind: source.source_kind.as_str().to_string(),
        source_ref: source.source_ref,
        summary,
        outcome,
        store: store_context(&setup),
    };
    success("register", data)
}
