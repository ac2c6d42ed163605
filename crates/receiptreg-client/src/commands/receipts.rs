use std::path::Path;

use crate::ClientResult;
use crate::commands::common::open_store;
use crate::config::load_context;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::ReceiptListData;
use crate::store::{ReceiptQuery, Store};

pub fn list(context_path: &Path) -> ClientResult<SuccessEnvelope> {
    list_with_home_override(context_path, None)
}

#[doc(hidden)]
pub fn list_with_home_override(
    context_path: &Path,
    home_override: Option<&Path>,
) -> ClientResult<SuccessEnvelope> {
    let context = load_context(context_path)?;
    let (_, store) = open_store(home_override)?;
    let receipts = store.receipts(&context.id, &ReceiptQuery::All)?;
    success(
        "receipt list",
        ReceiptListData {
            context_id: context.id,
            receipts,
        },
    )
}
