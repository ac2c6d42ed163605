use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::register::input::invalid_input_error;
use crate::{ClientError, ClientResult};

pub const REQUIRED_CSV_HEADERS: [&str; 4] = ["account_number", "address", "month", "year"];
pub const OPTIONAL_CSV_HEADERS: [&str; 14] = [
    "services",
    "category",
    "tin",
    "routing_number",
    "bank_account",
    "to_pay",
    "import_id",
    "unit_name",
    "unit_type",
    "address_global_id",
    "address_import_id",
    "account_global_id",
    "account_import_id",
    "full_name",
];

/// Top-level CSV columns and the receipt field each one fills.
const CSV_TOP_LEVEL: [(&str, &str); 10] = [
    ("account_number", "accountNumber"),
    ("address", "address"),
    ("month", "month"),
    ("year", "year"),
    ("category", "category"),
    ("tin", "tin"),
    ("routing_number", "routingNumber"),
    ("bank_account", "bankAccount"),
    ("to_pay", "toPay"),
    ("import_id", "importId"),
];

const CSV_ADDRESS_META: [(&str, &str); 4] = [
    ("unit_name", "unitName"),
    ("unit_type", "unitType"),
    ("address_global_id", "globalId"),
    ("address_import_id", "importId"),
];

const CSV_ACCOUNT_META: [(&str, &str); 3] = [
    ("account_global_id", "globalId"),
    ("account_import_id", "importId"),
    ("full_name", "fullName"),
];

/// Splits batch text into `(index, record)` pairs. Records are not validated
/// beyond their container shape.
pub fn parse_batch(content: &str) -> ClientResult<Vec<(i64, Value)>> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(invalid_input_error("Batch source is empty."));
    }

    if trimmed.starts_with('{') {
        return parse_json_object(trimmed);
    }

    if trimmed.starts_with('[') {
        return parse_json_array(trimmed);
    }

    if looks_like_csv(trimmed) {
        return parse_csv(trimmed);
    }

    if serde_json::from_str::<Value>(trimmed).is_ok() {
        return Err(ClientError::invalid_batch_format(
            "JSON input must be an object keyed by record index or an array of records.",
            "json_scalar",
        ));
    }

    Err(ClientError::invalid_batch_format(
        "Unsupported batch format. Provide JSON or CSV with headers.",
        "unknown",
    ))
}

fn parse_json_object(content: &str) -> ClientResult<Vec<(i64, Value)>> {
    let parsed = serde_json::from_str::<Map<String, Value>>(content).map_err(|error| {
        ClientError::invalid_batch_format(&format!("Invalid JSON object: {error}"), "json_object")
    })?;

    parsed
        .into_iter()
        .map(|(key, value)| {
            let index = key.trim().parse::<i64>().map_err(|_| {
                ClientError::invalid_batch_format(
                    &format!("Record key `{key}` is not an integer index."),
                    "json_object",
                )
            })?;
            Ok((index, value))
        })
        .collect()
}

fn parse_json_array(content: &str) -> ClientResult<Vec<(i64, Value)>> {
    let parsed = serde_json::from_str::<Vec<Value>>(content).map_err(|error| {
        ClientError::invalid_batch_format(&format!("Invalid JSON array: {error}"), "json_array")
    })?;

    Ok(parsed
        .into_iter()
        .enumerate()
        .map(|(index, value)| (index as i64, value))
        .collect())
}

fn parse_csv(content: &str) -> ClientResult<Vec<(i64, Value)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|_| invalid_input_error("CSV header row is missing or unreadable."))?
        .iter()
        .map(|value| value.trim().to_string())
        .collect::<Vec<String>>();

    if !headers_are_valid(&headers) {
        return Err(ClientError::batch_schema_mismatch(expected_headers(), headers));
    }

    let index_by_name = headers
        .iter()
        .enumerate()
        .map(|(index, name)| (name.to_string(), index))
        .collect::<HashMap<String, usize>>();

    let mut records = Vec::new();
    for (row_index, result_row) in reader.records().enumerate() {
        let row =
            result_row.map_err(|_| invalid_input_error("CSV rows are malformed or not UTF-8."))?;
        records.push((row_index as i64, csv_record(&row, &index_by_name)));
    }

    Ok(records)
}

fn csv_record(row: &csv::StringRecord, index_by_name: &HashMap<String, usize>) -> Value {
    let mut record = Map::new();
    for (column, field) in CSV_TOP_LEVEL {
        if let Some(value) = value_for(row, index_by_name, column) {
            record.insert(field.to_string(), Value::String(value));
        }
    }

    let address_meta = nested(row, index_by_name, &CSV_ADDRESS_META);
    if !address_meta.is_empty() {
        record.insert("addressMeta".to_string(), Value::Object(address_meta));
    }
    let account_meta = nested(row, index_by_name, &CSV_ACCOUNT_META);
    if !account_meta.is_empty() {
        record.insert("accountMeta".to_string(), Value::Object(account_meta));
    }

    if let Some(services) = value_for(row, index_by_name, "services") {
        let services = services
            .split(';')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| json!({ "name": name }))
            .collect();
        record.insert("services".to_string(), Value::Array(services));
    }

    Value::Object(record)
}

fn nested(
    row: &csv::StringRecord,
    index_by_name: &HashMap<String, usize>,
    columns: &[(&str, &str)],
) -> Map<String, Value> {
    columns
        .iter()
        .filter_map(|(column, field)| {
            value_for(row, index_by_name, column).map(|value| (field.to_string(), Value::String(value)))
        })
        .collect()
}

fn value_for(
    row: &csv::StringRecord,
    index_by_name: &HashMap<String, usize>,
    field_name: &str,
) -> Option<String> {
    let index = index_by_name.get(field_name)?;
    let value = row.get(*index)?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

fn looks_like_csv(content: &str) -> bool {
    let Some(first_line) = content.lines().find(|line| !line.trim().is_empty()) else {
        return false;
    };
    first_line.contains(',')
}

fn headers_are_valid(actual_headers: &[String]) -> bool {
    let has_required = REQUIRED_CSV_HEADERS
        .iter()
        .all(|required| actual_headers.iter().any(|header| header == required));
    let all_known = actual_headers.iter().all(|header| {
        REQUIRED_CSV_HEADERS.contains(&header.as_str()) || OPTIONAL_CSV_HEADERS.contains(&header.as_str())
    });
    has_required && all_known
}

fn expected_headers() -> Vec<String> {
    REQUIRED_CSV_HEADERS
        .iter()
        .chain(OPTIONAL_CSV_HEADERS.iter())
        .map(ToString::to_string)
        .collect()
}
