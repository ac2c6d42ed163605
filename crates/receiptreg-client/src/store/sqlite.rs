use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Row, params, params_from_iter};
use serde_json::Value;
use ulid::Ulid;

use crate::model::{
    BillingAccount, BillingCategory, BillingProperty, BillingReceipt, BillingRecipient,
    OrganizationProperty, OwnerType, UnitType,
};
use crate::setup::{SetupContext, ensure_initialized_at};
use crate::state::{map_sqlite_error, open_connection};
use crate::store::{
    CreateInput, EntityKind, Field, FieldValue, ReceiptQuery, Sender, Store, UpdateInput,
};
use crate::{ClientError, ClientResult};

const ACCOUNT_COLUMNS: &str = "id, number, property_id, unit_name, unit_type, global_id, \
     import_id, full_name, is_closed, owner_type";
const PROPERTY_COLUMNS: &str = "id, address, address_key, import_id, global_id";
const RECIPIENT_COLUMNS: &str = "id, name, bank_name, bank_account, tin, iec, bic, \
     offsetting_account, territory_code, is_approved";
const RECEIPT_COLUMNS: &str = "id, account_id, property_id, category_id, receiver_id, period, \
     to_pay, to_pay_details, services, import_id, balance_updated_at, created_at, updated_at";

/// Receipt row with JSON columns still in their stored text form.
struct ReceiptRow {
    receipt: BillingReceipt,
    to_pay_details: Option<String>,
    services: Option<String>,
}

pub struct SqliteStore {
    connection: Connection,
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn open(setup: &SetupContext) -> ClientResult<Self> {
        let connection = open_connection(&setup.db_path)?;
        Ok(Self {
            connection,
            db_path: setup.db_path.clone(),
        })
    }

    /// Initializes the store under `home` and opens it.
    pub fn open_at(home: &Path) -> ClientResult<Self> {
        let setup = ensure_initialized_at(home)?;
        Self::open(&setup)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn sql_error(&self, error: &rusqlite::Error) -> ClientError {
        map_sqlite_error(&self.db_path, error)
    }

    fn query_accounts(&self, clause: &str, args: &[&str]) -> ClientResult<Vec<BillingAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM billing_accounts WHERE {clause}");
        let mut statement = self
            .connection
            .prepare(&sql)
            .map_err(|error| self.sql_error(&error))?;
        let rows = statement
            .query_map(params_from_iter(args.iter()), account_from_row)
            .map_err(|error| self.sql_error(&error))?;
        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row.map_err(|error| self.sql_error(&error))?);
        }
        Ok(accounts)
    }

    fn query_properties(&self, clause: &str, args: &[&str]) -> ClientResult<Vec<BillingProperty>> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM billing_properties WHERE {clause}");
        let mut statement = self
            .connection
            .prepare(&sql)
            .map_err(|error| self.sql_error(&error))?;
        let rows = statement
            .query_map(params_from_iter(args.iter()), property_from_row)
            .map_err(|error| self.sql_error(&error))?;
        let mut properties = Vec::new();
        for row in rows {
            properties.push(row.map_err(|error| self.sql_error(&error))?);
        }
        Ok(properties)
    }

    fn query_recipients(
        &self,
        clause: &str,
        args: &[&str],
    ) -> ClientResult<Vec<BillingRecipient>> {
        let sql = format!("SELECT {RECIPIENT_COLUMNS} FROM billing_recipients WHERE {clause}");
        let mut statement = self
            .connection
            .prepare(&sql)
            .map_err(|error| self.sql_error(&error))?;
        let rows = statement
            .query_map(params_from_iter(args.iter()), recipient_from_row)
            .map_err(|error| self.sql_error(&error))?;
        let mut recipients = Vec::new();
        for row in rows {
            recipients.push(row.map_err(|error| self.sql_error(&error))?);
        }
        Ok(recipients)
    }

    fn query_receipts(
        &self,
        clause: &str,
        args: &[Option<&str>],
    ) -> ClientResult<Vec<BillingReceipt>> {
        let sql = format!("SELECT {RECEIPT_COLUMNS} FROM billing_receipts WHERE {clause}");
        let mut statement = self
            .connection
            .prepare(&sql)
            .map_err(|error| self.sql_error(&error))?;
        let rows = statement
            .query_map(params_from_iter(args.iter()), receipt_from_row)
            .map_err(|error| self.sql_error(&error))?;
        let mut receipts = Vec::new();
        for row in rows {
            let row = row.map_err(|error| self.sql_error(&error))?;
            receipts.push(decode_receipt(row)?);
        }
        Ok(receipts)
    }
}

impl Store for SqliteStore {
    fn organization_properties(
        &self,
        organization_id: &str,
    ) -> ClientResult<Vec<OrganizationProperty>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT id, organization_id, address, address_key
                 FROM organization_properties
                 WHERE organization_id = ?1 AND deleted_at IS NULL
                 ORDER BY created_at, id",
            )
            .map_err(|error| self.sql_error(&error))?;
        let rows = statement
            .query_map([organization_id], |row| {
                Ok(OrganizationProperty {
                    id: row.get(0)?,
                    organization_id: row.get(1)?,
                    address: row.get(2)?,
                    address_key: row.get(3)?,
                })
            })
            .map_err(|error| self.sql_error(&error))?;
        let mut properties = Vec::new();
        for row in rows {
            properties.push(row.map_err(|error| self.sql_error(&error))?);
        }
        Ok(properties)
    }

    fn add_organization_property(
        &self,
        organization_id: &str,
        address: &str,
        address_key: &str,
    ) -> ClientResult<OrganizationProperty> {
        let id = format!("oprop_{}", Ulid::new());
        self.connection
            .execute(
                "INSERT INTO organization_properties (id, organization_id, address, address_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![&id, organization_id, address, address_key, now_timestamp()],
            )
            .map_err(|error| self.sql_error(&error))?;
        Ok(OrganizationProperty {
            id,
            organization_id: organization_id.to_string(),
            address: address.to_string(),
            address_key: address_key.to_string(),
        })
    }

    fn categories(&self) -> ClientResult<Vec<BillingCategory>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT id, name, service_names FROM billing_categories
                 WHERE deleted_at IS NULL
                 ORDER BY sort_order, id",
            )
            .map_err(|error| self.sql_error(&error))?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|error| self.sql_error(&error))?;
        let mut categories = Vec::new();
        for row in rows {
            let (id, name, service_names) = row.map_err(|error| self.sql_error(&error))?;
            let service_names: BTreeSet<String> = serde_json::from_str(&service_names)
                .map_err(|error| {
                    ClientError::internal_store(&format!(
                        "Category `{id}` has malformed service names: {error}"
                    ))
                })?;
            categories.push(BillingCategory {
                id,
                name,
                service_names,
            });
        }
        Ok(categories)
    }

    fn accounts(&self, context_id: &str) -> ClientResult<Vec<BillingAccount>> {
        self.query_accounts(
            "context_id = ?1 AND deleted_at IS NULL ORDER BY created_at, id",
            &[context_id],
        )
    }

    fn properties(&self, context_id: &str) -> ClientResult<Vec<BillingProperty>> {
        self.query_properties(
            "context_id = ?1 AND deleted_at IS NULL ORDER BY created_at, id",
            &[context_id],
        )
    }

    fn recipients(&self, context_id: &str) -> ClientResult<Vec<BillingRecipient>> {
        self.query_recipients(
            "context_id = ?1 AND deleted_at IS NULL ORDER BY created_at, id",
            &[context_id],
        )
    }

    fn receipts(
        &self,
        context_id: &str,
        query: &ReceiptQuery<'_>,
    ) -> ClientResult<Vec<BillingReceipt>> {
        match query {
            ReceiptQuery::All => self.query_receipts(
                "context_id = ?1 AND deleted_at IS NULL ORDER BY created_at, id",
                &[Some(context_id)],
            ),
            ReceiptQuery::ByImportId(import_id) => self.query_receipts(
                "context_id = ?1 AND deleted_at IS NULL AND import_id = ?2 ORDER BY created_at, id",
                &[Some(context_id), Some(*import_id)],
            ),
            ReceiptQuery::ByPeriodAccount {
                period,
                account_id,
                receiver_id,
                category_id,
            } => self.query_receipts(
                "context_id = ?1 AND deleted_at IS NULL AND period = ?2 AND account_id = ?3
                 AND (receiver_id = ?4 OR category_id = ?5)
                 ORDER BY created_at, id",
                &[
                    Some(context_id),
                    Some(*period),
                    Some(*account_id),
                    *receiver_id,
                    *category_id,
                ],
            ),
        }
    }

    fn receipt_import_links(&self, context_id: &str) -> ClientResult<Vec<(String, String)>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT import_id, account_id FROM billing_receipts
                 WHERE context_id = ?1 AND deleted_at IS NULL AND import_id IS NOT NULL
                 ORDER BY created_at, id",
            )
            .map_err(|error| self.sql_error(&error))?;
        let rows = statement
            .query_map([context_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|error| self.sql_error(&error))?;
        let mut links = Vec::new();
        for row in rows {
            links.push(row.map_err(|error| self.sql_error(&error))?);
        }
        Ok(links)
    }

    fn get_account(&self, id: &str) -> ClientResult<Option<BillingAccount>> {
        Ok(self
            .query_accounts("id = ?1 AND deleted_at IS NULL", &[id])?
            .into_iter()
            .next())
    }

    fn get_property(&self, id: &str) -> ClientResult<Option<BillingProperty>> {
        Ok(self
            .query_properties("id = ?1 AND deleted_at IS NULL", &[id])?
            .into_iter()
            .next())
    }

    fn get_recipient(&self, id: &str) -> ClientResult<Option<BillingRecipient>> {
        Ok(self
            .query_recipients("id = ?1 AND deleted_at IS NULL", &[id])?
            .into_iter()
            .next())
    }

    fn get_receipt(&self, id: &str) -> ClientResult<Option<BillingReceipt>> {
        Ok(self
            .query_receipts("id = ?1 AND deleted_at IS NULL", &[Some(id)])?
            .into_iter()
            .next())
    }

    fn create(
        &self,
        kind: EntityKind,
        context_id: &str,
        input: &CreateInput,
    ) -> ClientResult<String> {
        let id = format!("{}_{}", kind.id_prefix(), Ulid::new());
        let timestamp = now_timestamp();

        let mut columns = vec![
            "id".to_string(),
            "context_id".to_string(),
            "sender".to_string(),
            "created_at".to_string(),
            "updated_at".to_string(),
        ];
        let mut values = vec![
            SqlValue::Text(id.clone()),
            SqlValue::Text(context_id.to_string()),
            SqlValue::Text(sender_json(&input.sender)?),
            SqlValue::Text(timestamp.clone()),
            SqlValue::Text(timestamp),
        ];
        for field in &input.fields {
            columns.push(checked_column(kind, field)?);
            values.push(field_sql_value(field)?);
        }

        let placeholders: Vec<String> = (1..=values.len()).map(|n| format!("?{n}")).collect();
        // Table and column names come from `EntityKind` allowlists.
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            kind.table(),
            columns.join(", "),
            placeholders.join(", ")
        );
        self.connection
            .execute(&sql, params_from_iter(values))
            .map_err(|error| self.sql_error(&error))?;

        tracing::debug!(kind = kind.as_str(), id = %id, "created entity");
        Ok(id)
    }

    fn update(&self, kind: EntityKind, id: &str, input: &UpdateInput) -> ClientResult<()> {
        if input.is_empty() {
            return Ok(());
        }

        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for field in &input.fields {
            assignments.push(format!("{} = ?{}", checked_column(kind, field)?, values.len() + 1));
            values.push(field_sql_value(field)?);
        }
        assignments.push(format!("sender = ?{}", values.len() + 1));
        values.push(SqlValue::Text(sender_json(&input.sender)?));
        assignments.push(format!("updated_at = ?{}", values.len() + 1));
        values.push(SqlValue::Text(now_timestamp()));
        let id_placeholder = values.len() + 1;
        values.push(SqlValue::Text(id.to_string()));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{id_placeholder} AND deleted_at IS NULL",
            kind.table(),
            assignments.join(", ")
        );
        let changed = self
            .connection
            .execute(&sql, params_from_iter(values))
            .map_err(|error| self.sql_error(&error))?;
        if changed == 0 {
            return Err(ClientError::internal_store(&format!(
                "No live {} with id `{id}` to update.",
                kind.as_str()
            )));
        }

        tracing::debug!(kind = kind.as_str(), id, "updated entity");
        Ok(())
    }
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn checked_column(kind: EntityKind, field: &Field) -> ClientResult<String> {
    let column = field.column();
    if kind.writable_columns().contains(&column.as_str()) {
        Ok(column)
    } else {
        Err(ClientError::internal_store(&format!(
            "Column `{column}` is not writable on {}.",
            kind.as_str()
        )))
    }
}

fn field_sql_value(field: &Field) -> ClientResult<SqlValue> {
    let value = match field {
        Field::Reference(_, id) => SqlValue::Text(id.clone()),
        Field::Value(_, FieldValue::Text(text)) => SqlValue::Text(text.clone()),
        Field::Value(_, FieldValue::Flag(flag)) => SqlValue::Integer(i64::from(*flag)),
        Field::Value(_, FieldValue::Json(json)) => SqlValue::Text(
            serde_json::to_string(json)
                .map_err(|error| ClientError::internal_serialization(&error.to_string()))?,
        ),
        Field::Value(_, FieldValue::Set(values)) => SqlValue::Text(
            serde_json::to_string(values)
                .map_err(|error| ClientError::internal_serialization(&error.to_string()))?,
        ),
    };
    Ok(value)
}

fn sender_json(sender: &Sender) -> ClientResult<String> {
    serde_json::to_string(sender)
        .map_err(|error| ClientError::internal_serialization(&error.to_string()))
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<BillingAccount> {
    let unit_type: Option<String> = row.get(4)?;
    let owner_type: String = row.get(9)?;
    Ok(BillingAccount {
        id: row.get(0)?,
        number: row.get(1)?,
        property_id: row.get(2)?,
        unit_name: row.get(3)?,
        unit_type: unit_type.as_deref().and_then(UnitType::from_name),
        global_id: row.get(5)?,
        import_id: row.get(6)?,
        full_name: row.get(7)?,
        is_closed: row.get::<_, i64>(8)? != 0,
        owner_type: OwnerType::from_name(&owner_type).unwrap_or(OwnerType::Person),
    })
}

fn property_from_row(row: &Row<'_>) -> rusqlite::Result<BillingProperty> {
    Ok(BillingProperty {
        id: row.get(0)?,
        address: row.get(1)?,
        address_key: row.get(2)?,
        import_id: row.get(3)?,
        global_id: row.get(4)?,
    })
}

fn recipient_from_row(row: &Row<'_>) -> rusqlite::Result<BillingRecipient> {
    Ok(BillingRecipient {
        id: row.get(0)?,
        name: row.get(1)?,
        bank_name: row.get(2)?,
        bank_account: row.get(3)?,
        tin: row.get(4)?,
        iec: row.get(5)?,
        bic: row.get(6)?,
        offsetting_account: row.get(7)?,
        territory_code: row.get(8)?,
        is_approved: row.get::<_, i64>(9)? != 0,
    })
}

fn receipt_from_row(row: &Row<'_>) -> rusqlite::Result<ReceiptRow> {
    Ok(ReceiptRow {
        receipt: BillingReceipt {
            id: row.get(0)?,
            account_id: row.get(1)?,
            property_id: row.get(2)?,
            category_id: row.get(3)?,
            receiver_id: row.get(4)?,
            period: row.get(5)?,
            to_pay: row.get(6)?,
            to_pay_details: None,
            services: None,
            import_id: row.get(9)?,
            balance_updated_at: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        },
        to_pay_details: row.get(7)?,
        services: row.get(8)?,
    })
}

fn decode_receipt(row: ReceiptRow) -> ClientResult<BillingReceipt> {
    let mut receipt = row.receipt;
    receipt.to_pay_details = decode_json(&receipt.id, row.to_pay_details.as_deref())?;
    receipt.services = decode_json(&receipt.id, row.services.as_deref())?;
    Ok(receipt)
}

fn decode_json(id: &str, text: Option<&str>) -> ClientResult<Option<Value>> {
    text.map(|text| {
        serde_json::from_str(text).map_err(|error| {
            ClientError::internal_store(&format!("Receipt `{id}` holds malformed JSON: {error}"))
        })
    })
    .transpose()
}
