mod error_text;
mod format;
mod json;
mod listing_text;
mod mode;
mod register_text;

use std::io;

use receiptreg_client::{ClientError, SuccessEnvelope};

use crate::stdout_io::write_stdout_line;

pub use mode::{OutputMode, mode_for_command};

pub fn print_success(success: &SuccessEnvelope, mode: OutputMode) -> io::Result<()> {
    let body = match mode {
        OutputMode::Text => render_text_success(success)?,
        OutputMode::Json => json::render_success_json(success)?,
    };
    write_stdout_line(&body)
}

pub fn print_failure(
    command: Option<&str>,
    error: &ClientError,
    mode: OutputMode,
) -> io::Result<()> {
    let body = match mode {
        OutputMode::Json => json::render_error_json(command, error)?,
        OutputMode::Text => error_text::render_error(error),
    };
    write_stdout_line(&body)
}

fn render_text_success(success: &SuccessEnvelope) -> io::Result<String> {
    match success.command.as_str() {
        "register" => register_text::render_register(&success.data),
        "receipt list" => listing_text::render_receipts(&success.data),
        "property add" => listing_text::render_property_add(&success.data),
        "property list" => listing_text::render_properties(&success.data),
        "category list" => listing_text::render_categories(&success.data),
        _ => Err(io::Error::other(format!(
            "unsupported text output command `{}`",
            success.command
        ))),
    }
}
