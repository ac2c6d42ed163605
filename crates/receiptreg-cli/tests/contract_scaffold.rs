use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

const EXPECTED_ROOT_HELP: &str = "receiptreg - utility receipt registration

Usage:
  receiptreg <command>

Start here:
  receiptreg category list
  receiptreg register --help
  receiptreg property add --context <file> --address <text>
";

const CONTEXT_TOML: &str = r#"
id = "ctx-cli"

[organization]
id = "org-cli"
tin = "7701234567"

[[directory.banks]]
routing_number = "044525225"
bank_name = "Sample Bank"

[[directory.organizations]]
tin = "7701234567"
name = "Sample Management"
"#;

const BATCH_JSON: &str = r#"{
  "0": {
    "accountNumber": "лс 20-I-1",
    "address": "ул.Ленина, д.5",
    "month": 3,
    "year": 2023,
    "services": [{ "name": "Electricity", "toPay": "150.5" }]
  },
  "1": {
    "accountNumber": "20-I-2",
    "address": "ул.Ленина, д.5",
    "month": 13,
    "year": 2023,
    "services": [{ "name": "Electricity" }]
  }
}"#;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

struct CliRun {
    code: Option<i32>,
    stdout: String,
}

impl CliRun {
    fn ok(&self) -> bool {
        self.code == Some(0)
    }
}

fn unique_test_home() -> PathBuf {
    let mut path = std::env::temp_dir();
    let stamp = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(value) => value.as_nanos(),
        Err(_) => 0,
    };
    let sequence = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!(
        "receiptreg-cli-test-{}-{stamp}-{sequence}",
        std::process::id()
    ));
    path
}

fn run_cli_in_home_with_input(home: &Path, args: &[&str], input: Option<&str>) -> CliRun {
    let mut command = Command::new(env!("CARGO_BIN_EXE_receiptreg"));
    command.args(args);
    command.env("RECEIPTREG_HOME", home);
    command.env_remove("RECEIPTREG_LOG");
    if input.is_some() {
        command.stdin(Stdio::piped());
    }
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let child_spawn = command.spawn();
    assert!(child_spawn.is_ok());
    if let Ok(mut child) = child_spawn {
        if let Some(body) = input {
            let stdin = child.stdin.take();
            assert!(stdin.is_some());
            if let Some(mut pipe) = stdin {
                let write_result = pipe.write_all(body.as_bytes());
                assert!(write_result.is_ok());
            }
        }

        let output = child.wait_with_output();
        assert!(output.is_ok());
        if let Ok(result) = output {
            let stdout = String::from_utf8(result.stdout);
            assert!(stdout.is_ok());
            if let Ok(stdout) = stdout {
                return CliRun {
                    code: result.status.code(),
                    stdout,
                };
            }
        }
    }

    CliRun {
        code: None,
        stdout: String::new(),
    }
}

fn run_cli_in_home(home: &Path, args: &[&str]) -> CliRun {
    run_cli_in_home_with_input(home, args, None)
}

fn run_cli(args: &[&str]) -> CliRun {
    run_cli_in_home(&unique_test_home(), args)
}

fn write_file(home: &Path, name: &str, body: &str) -> PathBuf {
    let create_home = fs::create_dir_all(home);
    assert!(create_home.is_ok());

    let path = home.join(name);
    let write = fs::write(&path, body);
    assert!(write.is_ok());
    path
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap_or_default()
}

fn parse_json(body: &str) -> Value {
    let parsed = serde_json::from_str::<Value>(body);
    assert!(parsed.is_ok(), "not JSON: {body}");
    if let Ok(value) = parsed {
        return value;
    }
    Value::Null
}

fn assert_text_error_contract(body: &str, code: &str) {
    assert!(body.contains("Registration could not proceed."));
    assert!(body.contains(&format!("  Error:    {code}")));
    assert!(body.contains("  Details:"));
    assert!(body.contains("What to do next:"));
}

fn assert_json_error_contract(body: &str, code: &str) -> Value {
    let payload = parse_json(body);
    assert_eq!(payload["ok"], Value::Bool(false));
    assert_eq!(payload["error"]["code"], Value::String(code.to_string()));
    assert!(payload["error"]["message"].is_string());
    assert!(payload["error"]["recovery_steps"].is_array());
    payload
}

#[test]
fn root_command_uses_short_plaintext_help() {
    let run = run_cli(&[]);
    assert!(run.ok());
    assert_eq!(run.stdout, EXPECTED_ROOT_HELP);
}

#[test]
fn help_and_version_return_success_output() {
    let help = run_cli(&["--help"]);
    assert!(help.ok());
    assert!(help.stdout.starts_with("receiptreg: utility receipt registration"));
    assert!(help.stdout.contains("RECEIPTREG_HOME"));

    let version = run_cli(&["--version"]);
    assert!(version.ok());
    assert_eq!(version.stdout.trim(), "receiptreg 0.1.0");
}

#[test]
fn register_help_shows_batch_fields() {
    let run = run_cli(&["register", "--help"]);
    assert!(run.ok());
    assert!(run.stdout.contains("How registration works:"));
    assert!(run.stdout.contains("accountNumber (required)"));
}

#[test]
fn help_output_pipe_close_does_not_panic() {
    let home = unique_test_home();
    let mut producer = Command::new(env!("CARGO_BIN_EXE_receiptreg"));
    producer.args(["register", "--help"]);
    producer.env("RECEIPTREG_HOME", &home);
    producer.stdout(Stdio::piped());
    producer.stderr(Stdio::piped());

    let spawn = producer.spawn();
    assert!(spawn.is_ok());
    if let Ok(mut child) = spawn {
        if let Some(stdout_pipe) = child.stdout.take() {
            let mut reader = BufReader::new(stdout_pipe);
            let mut first_line = String::new();
            assert!(reader.read_line(&mut first_line).is_ok());
            assert!(!first_line.is_empty());
        }

        let status = child.wait();
        assert!(status.is_ok_and(|status| status.success()));

        if let Some(mut stderr_pipe) = child.stderr.take() {
            let mut stderr = String::new();
            assert!(stderr_pipe.read_to_string(&mut stderr).is_ok());
            assert!(!stderr.contains("Broken pipe"));
        }
    }
}

#[test]
fn category_list_text_and_json() {
    let home = unique_test_home();
    let text = run_cli_in_home(&home, &["category", "list"]);
    assert!(text.ok());
    assert!(text.stdout.starts_with("Billing categories (7):"));
    assert!(text.stdout.contains("Electricity"));

    let json = run_cli_in_home(&home, &["category", "list", "--json"]);
    assert!(json.ok());
    let payload = parse_json(&json.stdout);
    assert_eq!(payload["ok"], Value::Bool(true));
    assert_eq!(payload["command"], "category list");
    assert_eq!(payload["data"]["categories"].as_array().map(Vec::len), Some(7));
}

#[test]
fn register_json_reports_receipts_errors_and_problems() {
    let home = unique_test_home();
    let context = write_file(&home, "context.toml", CONTEXT_TOML);
    let batch = write_file(&home, "batch.json", BATCH_JSON);

    let run = run_cli_in_home(
        &home,
        &[
            "register",
            path_arg(&batch),
            "--context",
            path_arg(&context),
            "--json",
        ],
    );
    assert!(run.ok());
    let payload = parse_json(&run.stdout);
    assert_eq!(payload["command"], "register");
    let data = &payload["data"];
    assert_eq!(data["context_id"], "ctx-cli");
    assert_eq!(data["source_kind"], "file");
    assert!(data["receipts"]["0"]["id"].is_string());
    assert!(data["receipts"]["0"]["importId"].is_string());
    assert_eq!(data["error_receipts"]["1"]["code"], "WRONG_MONTH");
    assert_eq!(data["problems"]["0"][0]["code"], "NO_PROPERTY_IN_ORGANIZATION");
    assert_eq!(data["stages"].as_array().map(Vec::len), Some(6));
    assert!(data["store"]["db_path"].is_string());

    let listed = run_cli_in_home(
        &home,
        &["receipt", "list", "--context", path_arg(&context), "--json"],
    );
    assert!(listed.ok());
    let receipts = parse_json(&listed.stdout);
    assert_eq!(receipts["data"]["receipts"].as_array().map(Vec::len), Some(1));
    assert_eq!(receipts["data"]["receipts"][0]["period"], "2023-03-01");
    assert_eq!(receipts["data"]["receipts"][0]["to_pay"], "150.50");
}

#[test]
fn register_reads_stdin_and_renders_text() {
    let home = unique_test_home();
    let context = write_file(&home, "context.toml", CONTEXT_TOML);

    let run = run_cli_in_home_with_input(
        &home,
        &["register", "-", "--context", path_arg(&context)],
        Some(BATCH_JSON),
    );
    assert!(run.ok());
    assert!(run.stdout.starts_with("Batch registered."));
    assert!(run.stdout.contains("stdin"));
    assert!(run.stdout.contains("Failed records:"));
    assert!(run.stdout.contains("WRONG_MONTH"));
    assert!(run.stdout.contains("NO_PROPERTY_IN_ORGANIZATION"));
}

#[test]
fn property_add_then_list() {
    let home = unique_test_home();
    let context = write_file(&home, "context.toml", CONTEXT_TOML);

    let added = run_cli_in_home(
        &home,
        &[
            "property",
            "add",
            "--context",
            path_arg(&context),
            "--address",
            "ул.Ленина, д.5",
        ],
    );
    assert!(added.ok());
    assert!(added.stdout.contains("Organization property saved."));
    assert!(added.stdout.contains("ул-ленина-5"));

    let listed = run_cli_in_home(
        &home,
        &["property", "list", "--context", path_arg(&context), "--json"],
    );
    assert!(listed.ok());
    let payload = parse_json(&listed.stdout);
    assert_eq!(
        payload["data"]["organization_properties"][0]["address_key"],
        "ул-ленина-5"
    );
    assert_eq!(payload["data"]["organization_id"], "org-cli");
}

#[test]
fn malformed_batch_is_a_user_error() {
    let home = unique_test_home();
    let context = write_file(&home, "context.toml", CONTEXT_TOML);

    let run = run_cli_in_home_with_input(
        &home,
        &["register", "-", "--context", path_arg(&context), "--json"],
        Some("42"),
    );
    assert_eq!(run.code, Some(1));
    let payload = assert_json_error_contract(&run.stdout, "invalid_batch_format");
    assert_eq!(payload["command"], "register");
}

#[test]
fn missing_context_file_uses_text_error_contract() {
    let home = unique_test_home();
    let batch = write_file(&home, "batch.json", BATCH_JSON);
    let missing = home.join("missing.toml");

    let run = run_cli_in_home(
        &home,
        &["register", path_arg(&batch), "--context", path_arg(&missing)],
    );
    assert_eq!(run.code, Some(1));
    assert_text_error_contract(&run.stdout, "context_config_invalid");
}

#[test]
fn parse_errors_follow_requested_output_mode() {
    let text = run_cli(&["register", "batch.json"]);
    assert_eq!(text.code, Some(1));
    assert_text_error_contract(&text.stdout, "invalid_argument");
    assert!(text.stdout.contains("receiptreg register --help"));

    let json = run_cli(&["register", "batch.json", "--json"]);
    assert_eq!(json.code, Some(1));
    let payload = assert_json_error_contract(&json.stdout, "invalid_argument");
    assert_eq!(payload["command"], "register");
}

#[test]
fn corrupt_store_exits_with_internal_code() {
    let home = unique_test_home();
    write_file(&home, "registry.db", "not-a-sqlite-database");

    let run = run_cli_in_home(&home, &["category", "list", "--json"]);
    assert_eq!(run.code, Some(2));
    assert_json_error_contract(&run.stdout, "store_corrupt");
}
