use receiptreg_client::ClientError;
use serde_json::Value;

pub fn render_error(error: &ClientError) -> String {
    let mut lines = vec![
        "Registration could not proceed.".to_string(),
        String::new(),
        format!("  Error:    {}", error.code),
        format!("  Details:  {}", error.message),
    ];

    if let Some(path) = error
        .data
        .as_ref()
        .and_then(|data| data.get("path"))
        .and_then(Value::as_str)
    {
        lines.push(format!("  Path:     {path}"));
    }

    lines.push(String::new());
    lines.push("What to do next:".to_string());
    if error.recovery_steps.is_empty() {
        lines.push("  1. Retry the command.".to_string());
    } else {
        for (index, step) in error.recovery_steps.iter().enumerate() {
            lines.push(format!("  {}. {step}", index + 1));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use receiptreg_client::ClientError;
    use serde_json::json;

    use super::render_error;

    #[test]
    fn renders_standard_error_layout() {
        let error = ClientError::invalid_argument_with_recovery(
            "bad input",
            vec!["run receiptreg --help".to_string()],
        );

        let rendered = render_error(&error);
        assert!(rendered.starts_with("Registration could not proceed."));
        assert!(rendered.contains("  Error:    invalid_argument"));
        assert!(rendered.contains("  Details:  bad input"));
        assert!(rendered.contains("What to do next:"));
        assert!(rendered.contains("  1. run receiptreg --help"));
        assert!(!rendered.contains("Path:"));
    }

    #[test]
    fn renders_path_from_error_data() {
        let error = ClientError::new("store_locked", "busy", Vec::new())
            .with_data(json!({ "path": "/tmp/registry.db" }));

        let rendered = render_error(&error);
        assert!(rendered.contains("  Path:     /tmp/registry.db"));
        assert!(rendered.contains("  1. Retry the command."));
    }
}
