use rusqlite::Connection;
use rusqlite_migration::{M, Migrations};

const BOOTSTRAP_SQL: &str = include_str!("migrations/0001_bootstrap.sql");

pub const REQUIRED_TABLE_NAMES: [&str; 7] = [
    "internal_meta",
    "billing_categories",
    "organization_properties",
    "billing_properties",
    "billing_accounts",
    "billing_recipients",
    "billing_receipts",
];

pub const SCHEMA_VERSION: &str = "v1";

pub fn run_pending(conn: &mut Connection) -> rusqlite_migration::Result<()> {
    let migrations = Migrations::new(vec![M::up(BOOTSTRAP_SQL)]);
    migrations.to_latest(conn)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::{REQUIRED_TABLE_NAMES, run_pending};

    #[test]
    fn bootstrap_creates_every_required_table() {
        let opened = Connection::open_in_memory();
        assert!(opened.is_ok());
        if let Ok(mut conn) = opened {
            assert!(run_pending(&mut conn).is_ok());
            for name in REQUIRED_TABLE_NAMES {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [name],
                    |row| row.get::<_, i64>(0),
                );
                assert_eq!(count.ok(), Some(1), "missing table {name}");
            }
        }
    }

    #[test]
    fn bootstrap_seeds_default_category() {
        let opened = Connection::open_in_memory();
        assert!(opened.is_ok());
        if let Ok(mut conn) = opened {
            assert!(run_pending(&mut conn).is_ok());
            let name = conn.query_row(
                "SELECT name FROM billing_categories WHERE id = '928c97ef-5289-4daa-b80e-4b9fed50c629'",
                [],
                |row| row.get::<_, String>(0),
            );
            assert_eq!(name.ok().as_deref(), Some("Housing and utilities"));
        }
    }
}
