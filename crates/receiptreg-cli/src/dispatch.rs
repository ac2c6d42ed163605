use receiptreg_client::commands;
use receiptreg_client::commands::properties::PropertyAddOptions;
use receiptreg_client::{ClientResult, SuccessEnvelope};

use crate::cli::{CategoryCommand, Cli, Commands, PropertyCommand, ReceiptCommand};

pub fn dispatch(cli: &Cli) -> ClientResult<SuccessEnvelope> {
    match &cli.command {
        Commands::Register { path, context, .. } => {
            commands::register::run(path.clone(), context.clone())
        }
        Commands::Receipt { command } => match command {
            ReceiptCommand::List { context, .. } => commands::receipts::list(context),
        },
        Commands::Property { command } => match command {
            PropertyCommand::Add {
                context,
                address,
                address_key,
                ..
            } => commands::properties::add(PropertyAddOptions {
                context_path: context,
                address: address.clone(),
                address_key: address_key.clone(),
                home_override: None,
            }),
            PropertyCommand::List { context, .. } => commands::properties::list(context),
        },
        Commands::Category { command } => match command {
            CategoryCommand::List { .. } => commands::categories::list(),
        },
    }
}

/// Command name as it appears in envelopes and help hints.
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Register { .. } => "register",
        Commands::Receipt {
            command: ReceiptCommand::List { .. },
        } => "receipt list",
        Commands::Property { command } => match command {
            PropertyCommand::Add { .. } => "property add",
            PropertyCommand::List { .. } => "property list",
        },
        Commands::Category {
            command: CategoryCommand::List { .. },
        } => "category list",
    }
}
