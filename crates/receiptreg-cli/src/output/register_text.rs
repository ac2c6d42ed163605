use std::io;

use serde_json::{Map, Value};

use super::format::{self, Column};

pub fn render_register(data: &Value) -> io::Result<String> {
    let summary = data
        .get("summary")
        .and_then(Value::as_object)
        .ok_or_else(|| io::Error::other("register output requires summary"))?;
    let stages = data
        .get("stages")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("register output requires stages"))?;

    let source = match data.get("source_ref").and_then(Value::as_str) {
        Some(path) => path.to_string(),
        None => "stdin".to_string(),
    };

    let mut lines = vec!["Batch registered.".to_string(), String::new()];
    lines.extend(format::key_value_rows(
        &[
            ("Context:", text(data, "context_id")),
            ("Source:", source),
            ("Records:", count(summary, "records")),
            ("Registered:", count(summary, "registered")),
            ("Failed:", count(summary, "failed")),
            ("With problems:", count(summary, "with_problems")),
        ],
        2,
    ));

    lines.push(String::new());
    lines.push("Stages:".to_string());
    let stage_rows = stages
        .iter()
        .map(|stage| {
            vec![
                text(stage, "stage"),
                number(stage, "created"),
                number(stage, "updated"),
                number(stage, "untouched"),
                number(stage, "failed"),
                format!("{} ms", number(stage, "elapsed_ms")),
            ]
        })
        .collect::<Vec<_>>();
    lines.extend(format::render_table_or_blocks(
        &[
            Column::left("Stage"),
            Column::right("Created"),
            Column::right("Updated"),
            Column::right("Untouched"),
            Column::right("Failed"),
            Column::right("Elapsed"),
        ],
        &stage_rows,
        format::terminal_width(),
        "Stage",
    ));

    let failures = failure_rows(data.get("error_receipts"));
    if !failures.is_empty() {
        lines.push(String::new());
        lines.push("Failed records:".to_string());
        lines.extend(format::render_table_or_blocks(
            &[
                Column::right("Index"),
                Column::left("Code"),
                Column::left("Message"),
            ],
            &failures,
            format::terminal_width(),
            "Failure",
        ));
    }

    let problems = problem_rows(data.get("problems"));
    if !problems.is_empty() {
        lines.push(String::new());
        lines.push("Problems:".to_string());
        lines.extend(format::render_table_or_blocks(
            &[
                Column::right("Index"),
                Column::left("Code"),
                Column::left("Details"),
            ],
            &problems,
            format::terminal_width(),
            "Problem",
        ));
    }

    if !failures.is_empty() || !problems.is_empty() {
        lines.push(String::new());
        lines.push("Fix the reported records and register the batch again;".to_string());
        lines.push("records that already registered are matched, not duplicated.".to_string());
    }

    Ok(lines.join("\n"))
}

fn failure_rows(errors: Option<&Value>) -> Vec<Vec<String>> {
    let Some(errors) = errors.and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut rows = errors
        .iter()
        .map(|(index, error)| {
            vec![index.clone(), text(error, "code"), text(error, "message")]
        })
        .collect::<Vec<_>>();
    rows.sort_by_key(|row| row[0].parse::<i64>().unwrap_or(i64::MAX));
    rows
}

fn problem_rows(problems: Option<&Value>) -> Vec<Vec<String>> {
    let Some(problems) = problems.and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    for (index, list) in problems {
        for problem in list.as_array().into_iter().flatten() {
            rows.push(vec![
                index.clone(),
                text(problem, "code"),
                problem_details(problem.get("params")),
            ]);
        }
    }
    rows.sort_by_key(|row| row[0].parse::<i64>().unwrap_or(i64::MAX));
    rows
}

fn problem_details(params: Option<&Value>) -> String {
    let Some(params) = params.and_then(Value::as_object) else {
        return String::new();
    };
    params
        .iter()
        .map(|(key, value)| match value {
            Value::Array(items) => format!(
                "{key}: {}",
                items
                    .iter()
                    .map(|item| item.as_str().map_or_else(|| item.to_string(), ToString::to_string))
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
            Value::String(text) => format!("{key}: {text}"),
            other => format!("{key}: {other}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn text(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn number(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_u64)
        .unwrap_or(0)
        .to_string()
}

fn count(summary: &Map<String, Value>, key: &str) -> String {
    summary
        .get(key)
        .and_then(Value::as_u64)
        .unwrap_or(0)
        .to_string()
}
