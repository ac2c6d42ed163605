use std::io;

use serde_json::Value;

use super::format::{self, Column};

pub fn render_receipts(data: &Value) -> io::Result<String> {
    let receipts = array(data, "receipts")?;
    let context = field(data, "context_id", "");

    if receipts.is_empty() {
        return Ok([
            format!("No receipts registered under context `{context}` yet."),
            String::new(),
            "Register a batch first:".to_string(),
            "  receiptreg register <path> --context <file>".to_string(),
        ]
        .join("\n"));
    }

    let rows = receipts
        .iter()
        .map(|receipt| {
            vec![
                field(receipt, "period", ""),
                field(receipt, "account_id", ""),
                field(receipt, "to_pay", "-"),
                field(receipt, "balance_updated_at", "-"),
                field(receipt, "id", ""),
            ]
        })
        .collect::<Vec<_>>();

    let mut lines = vec![format!("Receipts ({}):", receipts.len())];
    lines.extend(format::render_table_or_blocks(
        &[
            Column::left("Period"),
            Column::left("Account"),
            Column::right("To pay"),
            Column::left("Balance updated"),
            Column::left("Id"),
        ],
        &rows,
        format::terminal_width(),
        "Receipt",
    ));
    Ok(lines.join("\n"))
}

pub fn render_property_add(data: &Value) -> io::Result<String> {
    let property = data
        .get("property")
        .ok_or_else(|| io::Error::other("property add output requires property"))?;
    let mut lines = vec!["Organization property saved.".to_string(), String::new()];
    lines.extend(format::key_value_rows(
        &[
            ("Organization:", field(data, "organization_id", "")),
            ("Address:", field(property, "address", "")),
            ("Address key:", field(property, "address_key", "")),
            ("Id:", field(property, "id", "")),
        ],
        2,
    ));
    Ok(lines.join("\n"))
}

pub fn render_properties(data: &Value) -> io::Result<String> {
    let organization = array(data, "organization_properties")?;
    let billing = array(data, "billing_properties")?;

    let mut lines = vec![format!(
        "Organization properties ({}):",
        organization.len()
    )];
    if organization.is_empty() {
        lines.push("  none; add one with `receiptreg property add`".to_string());
    } else {
        let rows = organization
            .iter()
            .map(|property| {
                vec![
                    field(property, "address", ""),
                    field(property, "address_key", ""),
                ]
            })
            .collect::<Vec<_>>();
        lines.extend(format::render_table_or_blocks(
            &[Column::left("Address"), Column::left("Key")],
            &rows,
            format::terminal_width(),
            "Property",
        ));
    }

    lines.push(String::new());
    lines.push(format!("Billing properties ({}):", billing.len()));
    if billing.is_empty() {
        lines.push("  none".to_string());
    } else {
        let rows = billing
            .iter()
            .map(|property| {
                vec![
                    field(property, "address", ""),
                    field(property, "address_key", ""),
                    field(property, "import_id", "-"),
                ]
            })
            .collect::<Vec<_>>();
        lines.extend(format::render_table_or_blocks(
            &[
                Column::left("Address"),
                Column::left("Key"),
                Column::left("Import id"),
            ],
            &rows,
            format::terminal_width(),
            "Property",
        ));
    }

    Ok(lines.join("\n"))
}

pub fn render_categories(data: &Value) -> io::Result<String> {
    let categories = array(data, "categories")?;
    let rows = categories
        .iter()
        .map(|category| {
            let services = category
                .get("service_names")
                .and_then(Value::as_array)
                .map(|names| {
                    names
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            vec![
                field(category, "name", ""),
                services,
                field(category, "id", ""),
            ]
        })
        .collect::<Vec<_>>();

    let mut lines = vec![format!("Billing categories ({}):", categories.len())];
    lines.extend(format::render_table_or_blocks(
        &[
            Column::left("Name"),
            Column::left("Services"),
            Column::left("Id"),
        ],
        &rows,
        format::terminal_width(),
        "Category",
    ));
    Ok(lines.join("\n"))
}

fn array<'a>(data: &'a Value, key: &str) -> io::Result<&'a Vec<Value>> {
    data.get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other(format!("output requires `{key}`")))
}

fn field(value: &Value, key: &str, fallback: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}
