use std::fs;

use receiptreg_client::setup::ensure_initialized_at;
use rusqlite::Connection;
use tempfile::tempdir;

fn object_exists(connection: &Connection, object_type: &str, object_name: &str) -> bool {
    connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2",
            [object_type, object_name],
            |_| Ok(()),
        )
        .is_ok()
}

fn user_version(connection: &Connection) -> Option<i64> {
    connection
        .query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
        .ok()
}

fn count(connection: &Connection, sql: &str) -> Option<i64> {
    connection.query_row(sql, [], |row| row.get::<_, i64>(0)).ok()
}

#[test]
fn setup_creates_registry_db_at_home_override() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path().join("registry-home");

        let context = ensure_initialized_at(&home);
        assert!(context.is_ok());
        if let Ok(setup_context) = context {
            assert!(setup_context.db_path.ends_with("registry.db"));
            assert_eq!(setup_context.schema_version, "v1");
            assert!(home.join("registry.db").exists());
        }
    }
}

#[test]
fn migration_applies_exactly_once() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path().join("registry-home");

        for _ in 0..2 {
            let context = ensure_initialized_at(&home);
            assert!(context.is_ok());
            if let Ok(setup_context) = context {
                let connection = Connection::open(&setup_context.db_path);
                assert!(connection.is_ok());
                if let Ok(conn) = connection {
                    assert_eq!(user_version(&conn), Some(1));
                    assert_eq!(
                        count(&conn, "SELECT COUNT(*) FROM billing_categories"),
                        Some(7)
                    );
                }
            }
        }
    }
}

#[test]
fn setup_creates_billing_tables_and_unique_indexes() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path().join("registry-home");

        let context = ensure_initialized_at(&home);
        assert!(context.is_ok());
        if let Ok(setup_context) = context {
            let connection = Connection::open(&setup_context.db_path);
            assert!(connection.is_ok());
            if let Ok(conn) = connection {
                for table in [
                    "internal_meta",
                    "billing_categories",
                    "organization_properties",
                    "billing_properties",
                    "billing_accounts",
                    "billing_recipients",
                    "billing_receipts",
                ] {
                    assert!(object_exists(&conn, "table", table), "missing table {table}");
                }

                let unique_indexes = count(
                    &conn,
                    "SELECT COUNT(*) FROM sqlite_master
                     WHERE type = 'index' AND sql LIKE 'CREATE UNIQUE INDEX%'",
                );
                assert!(unique_indexes.is_some_and(|found| found >= 3));
            }
        }
    }
}

#[test]
fn setup_fails_when_core_table_missing() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path().join("registry-home");

        let context = ensure_initialized_at(&home);
        assert!(context.is_ok());
        if let Ok(setup_context) = context {
            let connection = Connection::open(&setup_context.db_path);
            assert!(connection.is_ok());
            if let Ok(conn) = connection {
                let drop_result = conn.execute_batch("DROP TABLE billing_recipients;");
                assert!(drop_result.is_ok());
            }

            let failed = ensure_initialized_at(&home);
            assert!(failed.is_err());
            if let Err(error) = failed {
                assert_eq!(error.code, "store_corrupt");
            }
        }
    }
}

#[test]
fn setup_maps_corrupt_database_to_store_corrupt() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path().join("registry-home");
        let create_home = fs::create_dir_all(&home);
        assert!(create_home.is_ok());

        let write_file = fs::write(home.join("registry.db"), "not-a-sqlite-database");
        assert!(write_file.is_ok());

        let result = ensure_initialized_at(&home);
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "store_corrupt");
        }
    }
}
