use std::io;

use receiptreg_client::contracts::envelope::failure_from_error;
use receiptreg_client::{ClientError, SuccessEnvelope};
use serde::Serialize;

pub fn render_success_json(success: &SuccessEnvelope) -> io::Result<String> {
    serialize_json_pretty(success)
}

pub fn render_error_json(command: Option<&str>, error: &ClientError) -> io::Result<String> {
    serialize_json_pretty(&failure_from_error(command, error))
}

fn serialize_json_pretty<T>(value: &T) -> io::Result<String>
where
    T: Serialize,
{
    serde_json::to_string_pretty(value).map_err(io::Error::other)
}
