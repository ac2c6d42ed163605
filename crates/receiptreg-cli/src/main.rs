mod cli;
mod dispatch;
mod output;
mod stdout_io;

use std::process::ExitCode;

use clap::{Parser, error::ErrorKind};
use receiptreg_client::ClientError;
use stdout_io::write_stdout_text;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "RECEIPTREG_LOG";

const ROOT_HELP: &str = "receiptreg - utility receipt registration

Usage:
  receiptreg <command>

Start here:
  receiptreg category list
  receiptreg register --help
  receiptreg property add --context <file> --address <text>
";

const TOP_LEVEL_HELP: &str = "receiptreg: utility receipt registration

USAGE: receiptreg <command>

Prepare the billing context:
  receiptreg category list                                       Show billing categories and service keywords
  receiptreg property add --context <file> --address <text>      Register a building of the organization
  receiptreg property list --context <file>                      Show organization and billing properties

Register receipts:
  1. receiptreg register --help                                  Read batch format and field rules
  2. receiptreg register <path> --context <file>                 Resolve and persist a batch
  3. receiptreg receipt list --context <file>                    Review registered receipts

Options available everywhere:
  --json                                                         Machine-readable output (per command)
  --verbose                                                      Log stage progress to stderr

Environment:
  RECEIPTREG_HOME   Registry directory (default ~/.receiptreg)
  RECEIPTREG_LOG    Log filter, e.g. `debug` or `receiptreg_client=debug`
";

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(code) => code,
    }
}

fn run() -> Result<ExitCode, ExitCode> {
    let raw_args = std::env::args().collect::<Vec<String>>();
    if raw_args.len() == 1 {
        if write_stdout_text(ROOT_HELP).is_err() {
            return Err(ExitCode::from(2));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let cli = match cli::Cli::try_parse() {
        Ok(value) => value,
        Err(err) => return handle_parse_error(&raw_args, &err),
    };
    init_tracing(cli.verbose);

    let mode = output::mode_for_command(&cli.command);
    let command = dispatch::command_name(&cli.command);
    match dispatch::dispatch(&cli) {
        Ok(success) => {
            if output::print_success(&success, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            tracing::debug!(code = %error.code, command, "command failed");
            if output::print_failure(Some(command), &error, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Err(exit_code_for_error(&error))
        }
    }
}

/// Logs go to stderr so stdout stays parseable. `RECEIPTREG_LOG` wins over
/// `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("tracing subscriber already installed");
    }
}

fn handle_parse_error(raw_args: &[String], err: &clap::Error) -> Result<ExitCode, ExitCode> {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            let text = if is_top_level_help_request(raw_args) {
                TOP_LEVEL_HELP.to_string()
            } else {
                err.to_string()
            };
            if write_stdout_text(&text).is_err() {
                return Err(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        ErrorKind::DisplayVersion => {
            if write_stdout_text(&err.to_string()).is_err() {
                return Err(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            let command_hint = command_path_from_args(raw_args);
            let clean_message = strip_clap_boilerplate(&err.to_string());
            let parse_error =
                ClientError::invalid_argument_for_command(&clean_message, command_hint);
            let mode = infer_requested_output_mode(raw_args);
            if output::print_failure(command_hint, &parse_error, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Err(ExitCode::from(1))
        }
    }
}

fn is_top_level_help_request(raw_args: &[String]) -> bool {
    raw_args.len() == 2 && matches!(raw_args[1].as_str(), "--help" | "-h")
}

/// Drops clap's trailing usage block; recovery steps carry the guidance.
fn strip_clap_boilerplate(message: &str) -> String {
    let trimmed = if let Some(pos) = message.find("\n\nUsage:") {
        &message[..pos]
    } else if let Some(pos) = message.find("\nFor more information") {
        &message[..pos]
    } else {
        message
    };
    trimmed.trim_end().to_string()
}

fn command_path_from_args(raw_args: &[String]) -> Option<&'static str> {
    let non_flags: Vec<&str> = raw_args
        .iter()
        .skip(1)
        .filter(|value| !value.starts_with('-'))
        .map(String::as_str)
        .collect();

    match non_flags.as_slice() {
        ["register", ..] => Some("register"),
        ["receipt", "list", ..] => Some("receipt list"),
        ["receipt", ..] => Some("receipt"),
        ["property", "add", ..] => Some("property add"),
        ["property", "list", ..] => Some("property list"),
        ["property", ..] => Some("property"),
        ["category", "list", ..] => Some("category list"),
        ["category", ..] => Some("category"),
        _ => None,
    }
}

fn infer_requested_output_mode(raw_args: &[String]) -> output::OutputMode {
    if raw_args.iter().skip(1).any(|value| value == "--json") {
        return output::OutputMode::Json;
    }
    output::OutputMode::Text
}

fn exit_code_for_error(error: &ClientError) -> ExitCode {
    if is_internal_error(error) {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

fn is_internal_error(error: &ClientError) -> bool {
    error.code.starts_with("internal_")
        || matches!(
            error.code.as_str(),
            "store_init_permission_denied"
                | "store_locked"
                | "store_corrupt"
                | "migration_failed"
                | "store_init_failed"
                | "reference_data_unavailable"
        )
}
