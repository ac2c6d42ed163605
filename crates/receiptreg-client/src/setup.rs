use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use crate::migrations::{REQUIRED_TABLE_NAMES, SCHEMA_VERSION, run_pending};
use crate::state::{RegistryHome, map_sqlite_error, open_connection};
use crate::{ClientError, ClientResult};

const BILLING_PROPERTIES_COLUMNS: [&str; 5] =
    ["id", "context_id", "address", "address_key", "deleted_at"];
const BILLING_ACCOUNTS_COLUMNS: [&str; 5] =
    ["id", "context_id", "number", "property_id", "deleted_at"];
const BILLING_RECIPIENTS_COLUMNS: [&str; 4] = ["id", "context_id", "bank_account", "deleted_at"];
const BILLING_RECEIPTS_COLUMNS: [&str; 7] = [
    "id",
    "context_id",
    "account_id",
    "period",
    "import_id",
    "balance_updated_at",
    "deleted_at",
];
const BILLING_CATEGORIES_COLUMNS: [&str; 3] = ["id", "name", "service_names"];

const REQUIRED_COLUMNS: [(&str, &[&str]); 5] = [
    ("billing_properties", &BILLING_PROPERTIES_COLUMNS),
    ("billing_accounts", &BILLING_ACCOUNTS_COLUMNS),
    ("billing_recipients", &BILLING_RECIPIENTS_COLUMNS),
    ("billing_receipts", &BILLING_RECEIPTS_COLUMNS),
    ("billing_categories", &BILLING_CATEGORIES_COLUMNS),
];

#[derive(Debug, Clone)]
pub struct SetupContext {
    pub db_path: PathBuf,
    pub schema_version: String,
}

pub fn ensure_initialized() -> ClientResult<SetupContext> {
    ensure_initialized_with_home_override(None)
}

pub fn ensure_initialized_at(home_override: &Path) -> ClientResult<SetupContext> {
    ensure_initialized_with_home_override(Some(home_override))
}

fn ensure_initialized_with_home_override(
    home_override: Option<&Path>,
) -> ClientResult<SetupContext> {
    let home = RegistryHome::resolve(home_override)?;
    home.prepare()?;

    let db_path = home.db_path();
    let mut connection = open_connection(&db_path)?;

    run_pending(&mut connection).map_err(|error| map_migration_error(&db_path, &error))?;
    verify_core_tables(&connection, &db_path)?;

    let schema_version = read_schema_version(&connection, &db_path)?;
    if schema_version != SCHEMA_VERSION {
        return Err(ClientError::store_corrupt(&db_path));
    }

    tracing::debug!(db_path = %db_path.display(), "registry store ready");
    Ok(SetupContext {
        db_path,
        schema_version,
    })
}

fn map_migration_error(db_path: &Path, error: &rusqlite_migration::Error) -> ClientError {
    match error {
        rusqlite_migration::Error::RusqliteError { query: _, err } => {
            let mapped = map_sqlite_error(db_path, err);
            if mapped.code == "store_locked"
                || mapped.code == "store_corrupt"
                || mapped.code == "store_init_permission_denied"
            {
                mapped
            } else {
                ClientError::migration_failed(db_path, &error.to_string())
            }
        }
        _ => ClientError::migration_failed(db_path, &error.to_string()),
    }
}

fn verify_core_tables(connection: &Connection, db_path: &Path) -> ClientResult<()> {
    for table_name in REQUIRED_TABLE_NAMES {
        if !sqlite_object_exists(connection, "table", table_name, db_path)? {
            return Err(ClientError::store_corrupt(db_path));
        }
    }

    for (table_name, required_columns) in REQUIRED_COLUMNS {
        let columns = table_columns(connection, table_name, db_path)?;
        for required_column in required_columns {
            if !columns.iter().any(|column| column == required_column) {
                return Err(ClientError::store_corrupt(db_path));
            }
        }
    }

    Ok(())
}

fn sqlite_object_exists(
    connection: &Connection,
    object_type: &str,
    object_name: &str,
    db_path: &Path,
) -> ClientResult<bool> {
    let exists = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2 LIMIT 1",
            params![object_type, object_name],
            |_row| Ok(true),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?
        .unwrap_or(false);

    Ok(exists)
}

fn table_columns(
    connection: &Connection,
    table_name: &str,
    db_path: &Path,
) -> ClientResult<Vec<String>> {
    if !REQUIRED_TABLE_NAMES.contains(&table_name) {
        return Err(ClientError::store_init_failed(
            db_path,
            "Refused PRAGMA table inspection for non-core table.",
        ));
    }

    // `table_name` comes from the compile-time allowlist above.
    let sql = format!("PRAGMA table_info({table_name})");
    let mut statement = connection
        .prepare(&sql)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let column_iter = statement
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut columns: Vec<String> = Vec::new();
    for row in column_iter {
        let column = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        columns.push(column);
    }

    Ok(columns)
}

fn read_schema_version(connection: &Connection, db_path: &Path) -> ClientResult<String> {
    let value = connection
        .query_row(
            "SELECT value FROM internal_meta WHERE key = 'schema_version' LIMIT 1",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    Ok(value.unwrap_or_else(|| SCHEMA_VERSION.to_string()))
}
