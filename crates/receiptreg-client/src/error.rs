use std::path::Path;

use serde_json::{Value, json};
use thiserror::Error;

pub(crate) const REGISTER_HELP_COMMAND: &str = "receiptreg register --help";

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClientError {
    pub code: String,
    pub message: String,
    pub recovery_steps: Vec<String>,
    pub data: Option<Value>,
}

impl ClientError {
    pub fn new(code: &str, message: &str, recovery_steps: Vec<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            recovery_steps,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::invalid_argument_for_command(message, None)
    }

    pub fn invalid_argument_for_command(message: &str, command: Option<&str>) -> Self {
        let help_hint = match command {
            Some(cmd) => format!("Run `receiptreg {cmd} --help` for usage."),
            None => "Run `receiptreg --help` for usage.".to_string(),
        };
        let error = Self::new("invalid_argument", message, vec![help_hint]);
        if let Some(cmd) = command {
            return error.with_data(json!({
                "command_hint": cmd,
            }));
        }
        error
    }

    pub fn invalid_argument_with_recovery(message: &str, recovery_steps: Vec<String>) -> Self {
        Self::new("invalid_argument", message, recovery_steps)
    }

    pub fn invalid_batch_format(message: &str, received_format: &str) -> Self {
        Self::new(
            "invalid_batch_format",
            message,
            vec![
                "Provide a JSON object keyed by record index, a JSON array, or CSV.".to_string(),
                format!("Run `{REGISTER_HELP_COMMAND}` to confirm field requirements."),
            ],
        )
        .with_data(json!({
            "received_format": received_format,
            "supported_formats": ["json_object", "json_array", "csv"],
        }))
    }

    pub fn batch_schema_mismatch(expected_headers: Vec<String>, actual_headers: Vec<String>) -> Self {
        Self::new(
            "batch_schema_mismatch",
            "CSV headers do not match the receipt batch schema.",
            vec![
                "Use only the documented snake_case headers.".to_string(),
                format!("Run `{REGISTER_HELP_COMMAND}` to review the field list."),
            ],
        )
        .with_data(json!({
            "expected_headers": expected_headers,
            "actual_headers": actual_headers,
        }))
    }

    pub fn context_config_invalid(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "context_config_invalid",
            &format!("Billing context file `{location}` could not be loaded: {detail}"),
            vec![
                "Check that the file exists and is valid TOML.".to_string(),
                "The file needs `id` and an `[organization]` table with `id` and `tin`."
                    .to_string(),
            ],
        )
    }

    pub fn reference_data_unavailable(stage: &str, detail: &str) -> Self {
        Self::new(
            "reference_data_unavailable",
            &format!("The {stage} stage could not load its reference data: {detail}"),
            vec!["Retry the registration once the store is reachable.".to_string()],
        )
    }

    pub fn internal_serialization(message: &str) -> Self {
        Self::new("internal_serialization_error", message, Vec::new())
    }

    pub fn internal_pattern(pattern: &str, detail: &str) -> Self {
        Self::new(
            "internal_pattern_error",
            &format!("Built-in pattern `{pattern}` failed to compile: {detail}"),
            Vec::new(),
        )
    }

    pub fn internal_store(message: &str) -> Self {
        Self::new("internal_store_error", message, Vec::new())
    }

    pub fn store_init_permission_denied(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_init_permission_denied",
            &format!("Cannot initialize the registry store at `{location}`: {detail}"),
            vec![format!(
                "Grant write access to `{location}` or set `RECEIPTREG_HOME` to a writable directory."
            )],
        )
    }

    pub fn store_locked(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_locked",
            &format!("Registry store is locked at `{location}`."),
            vec![format!(
                "Close other processes using `{location}` so the lock is released."
            )],
        )
    }

    pub fn store_corrupt(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_corrupt",
            &format!("Registry store appears corrupt at `{location}`."),
            vec![format!(
                "Replace `{location}` with a valid SQLite file or restore from backup."
            )],
        )
    }

    pub fn migration_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "migration_failed",
            &format!("Registry migration failed at `{location}`: {detail}"),
            vec!["Resolve conflicting schema objects referenced in the error details.".to_string()],
        )
    }

    pub fn store_init_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "store_init_failed",
            &format!("Registry store initialization failed at `{location}`: {detail}"),
            Vec::new(),
        )
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
