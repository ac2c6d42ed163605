use std::path::Path;

use crate::ClientResult;
use crate::contracts::types::StoreContext;
use crate::setup::{SetupContext, ensure_initialized, ensure_initialized_at};
use crate::store::SqliteStore;

pub(crate) fn load_setup(home_override: Option<&Path>) -> ClientResult<SetupContext> {
    match home_override {
        Some(home) => ensure_initialized_at(home),
        None => ensure_initialized(),
    }
}

pub(crate) fn open_store(home_override: Option<&Path>) -> ClientResult<(SetupContext, SqliteStore)> {
    let setup = load_setup(home_override)?;
    let store = SqliteStore::open(&setup)?;
    Ok((setup, store))
}

pub(crate) fn store_context(setup: &SetupContext) -> StoreContext {
    StoreContext {
        db_path: setup.db_path.display().to_string(),
        schema_version: setup.schema_version.clone(),
    }
}
