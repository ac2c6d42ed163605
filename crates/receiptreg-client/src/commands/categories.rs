use std::path::Path;

use crate::ClientResult;
use crate::commands::common::open_store;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::CategoryListData;
use crate::store::Store;

pub fn list() -> ClientResult<SuccessEnvelope> {
    list_with_home_override(None)
}

#[doc(hidden)]
pub fn list_with_home_override(home_override: Option<&Path>) -> ClientResult<SuccessEnvelope> {
    let (_, store) = open_store(home_override)?;
    let categories = store.categories()?;
    success("category list", CategoryListData { categories })
}
