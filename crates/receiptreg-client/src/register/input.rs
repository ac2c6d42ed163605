use std::fs;
use std::io::{IsTerminal, Read};

use crate::error::REGISTER_HELP_COMMAND;
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SourceKind {
    File,
    Stdin,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Stdin => "stdin",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub source_kind: SourceKind,
    pub source_ref: Option<String>,
    pub content: String,
}

pub(crate) fn invalid_input_error(message: &str) -> ClientError {
    ClientError::invalid_argument_with_recovery(
        message,
        vec![
            "Provide a JSON object, a JSON array, or CSV via path or stdin.".to_string(),
            format!("Run `{REGISTER_HELP_COMMAND}` to confirm batch field requirements."),
        ],
    )
}

/// Reads the batch from `path`, or from stdin when the path is `-`.
/// `stdin_override` stands in for stdin.
pub fn resolve_source(path: &str, stdin_override: Option<String>) -> ClientResult<ResolvedSource> {
    if path == "-" {
        return match read_stdin(stdin_override)? {
            Some(content) => Ok(ResolvedSource {
                source_kind: SourceKind::Stdin,
                source_ref: None,
                content,
            }),
            None => Err(invalid_input_error(
                "Path `-` means stdin input, but stdin was empty. Pipe JSON/CSV input or pass a file path.",
            )),
        };
    }

    let content = fs::read_to_string(path).map_err(|error| {
        ClientError::invalid_argument_with_recovery(
            &format!("Could not read batch file `{path}`: {error}"),
            vec![
                "Verify the path exists and is readable.".to_string(),
                "Rerun receiptreg register <path> --context <file>.".to_string(),
            ],
        )
    })?;

    Ok(ResolvedSource {
        source_kind: SourceKind::File,
        source_ref: Some(path.to_string()),
        content,
    })
}

fn read_stdin(stdin_override: Option<String>) -> ClientResult<Option<String>> {
    if let Some(value) = stdin_override {
        return Ok(Some(value).filter(|value| !value.trim().is_empty()));
    }

    if std::io::stdin().is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|error| {
            ClientError::invalid_argument_with_recovery(
                &format!("Could not read stdin: {error}"),
                vec![
                    "Retry with an explicit file path argument.".to_string(),
                    "Or rerun with valid stdin content.".to_string(),
                ],
            )
        })?;

    if buffer.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(buffer))
}
