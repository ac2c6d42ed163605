use crate::cli::{CategoryCommand, Commands, PropertyCommand, ReceiptCommand};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputMode {
    Text,
    Json,
}

pub fn mode_for_command(command: &Commands) -> OutputMode {
    let json = match command {
        Commands::Register { json, .. }
        | Commands::Receipt {
            command: ReceiptCommand::List { json, .. },
        }
        | Commands::Property {
            command: PropertyCommand::Add { json, .. } | PropertyCommand::List { json, .. },
        }
        | Commands::Category {
            command: CategoryCommand::List { json },
        } => *json,
    };
    if json {
        OutputMode::Json
    } else {
        OutputMode::Text
    }
}

#[cfg(test)]
mod tests {
    use super::{OutputMode, mode_for_command};
    use crate::cli::parse_from;

    #[test]
    fn mode_uses_json_for_register_with_json_flag() {
        let parsed = parse_from([
            "receiptreg",
            "register",
            "batch.json",
            "--context",
            "ctx.toml",
            "--json",
        ]);
        assert!(parsed.is_ok());
        if let Ok(cli) = parsed {
            assert_eq!(mode_for_command(&cli.command), OutputMode::Json);
        }
    }

    #[test]
    fn mode_uses_json_for_listings_with_json_flag() {
        let cases: [&[&str]; 3] = [
            &["receiptreg", "receipt", "list", "--context", "c.toml", "--json"],
            &["receiptreg", "property", "list", "--context", "c.toml", "--json"],
            &["receiptreg", "category", "list", "--json"],
        ];
        for args in cases {
            let parsed = parse_from(args);
            assert!(parsed.is_ok());
            if let Ok(cli) = parsed {
                assert_eq!(mode_for_command(&cli.command), OutputMode::Json);
            }
        }
    }

    #[test]
    fn mode_uses_text_for_commands_without_json_flag() {
        let parsed = parse_from(["receiptreg", "register", "-", "--context", "ctx.toml"]);
        assert!(parsed.is_ok());
        if let Ok(cli) = parsed {
            assert_eq!(mode_for_command(&cli.command), OutputMode::Text);
        }

        let categories = parse_from(["receiptreg", "category", "list"]);
        assert!(categories.is_ok());
        if let Ok(cli) = categories {
            assert_eq!(mode_for_command(&cli.command), OutputMode::Text);
        }
    }
}
