use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ClientError, ClientResult};

pub const DEFAULT_ADDRESS_CHUNK_SIZE: usize = 50;
pub const DEFAULT_YEAR_TOLERANCE: i32 = 10;

/// Tenant configuration a batch is registered against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BillingContext {
    pub id: String,
    pub organization: Organization,
    #[serde(default)]
    pub settings: ContextSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub directory: Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub tin: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextSettings {
    #[serde(default)]
    pub is_cottage_village: bool,
    #[serde(default)]
    pub force_category_detect: bool,
    #[serde(default)]
    pub address_transform: Vec<TransformRule>,
}

/// `from` starting with `r` is a regex; anything else is replaced literally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformRule {
    pub from: String,
    #[serde(default)]
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSettings {
    #[serde(default = "default_address_chunk_size")]
    pub address_chunk_size: usize,
    #[serde(default = "default_year_tolerance")]
    pub year_tolerance: i32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            address_chunk_size: DEFAULT_ADDRESS_CHUNK_SIZE,
            year_tolerance: DEFAULT_YEAR_TOLERANCE,
        }
    }
}

fn default_address_chunk_size() -> usize {
    DEFAULT_ADDRESS_CHUNK_SIZE
}

fn default_year_tolerance() -> i32 {
    DEFAULT_YEAR_TOLERANCE
}

/// Reference data backing the offline bank and organization lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Directory {
    #[serde(default)]
    pub banks: Vec<BankEntry>,
    #[serde(default)]
    pub organizations: Vec<OrganizationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BankEntry {
    pub routing_number: String,
    pub bank_name: String,
    #[serde(default)]
    pub offsetting_account: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrganizationEntry {
    pub tin: String,
    pub name: String,
    #[serde(default)]
    pub iec: String,
    #[serde(default)]
    pub territory_code: String,
}

pub fn load_context(path: &Path) -> ClientResult<BillingContext> {
    let text = fs::read_to_string(path)
        .map_err(|error| ClientError::context_config_invalid(path, &error.to_string()))?;
    parse_context(&text, path)
}

pub fn parse_context(text: &str, path: &Path) -> ClientResult<BillingContext> {
    let context: BillingContext = toml::from_str(text)
        .map_err(|error| ClientError::context_config_invalid(path, error.message()))?;

    if context.id.trim().is_empty() {
        return Err(ClientError::context_config_invalid(
            path,
            "`id` must not be empty.",
        ));
    }
    if context.organization.id.trim().is_empty() {
        return Err(ClientError::context_config_invalid(
            path,
            "`organization.id` must not be empty.",
        ));
    }
    if context.pipeline.address_chunk_size == 0 {
        return Err(ClientError::context_config_invalid(
            path,
            "`pipeline.address_chunk_size` must be at least 1.",
        ));
    }
    if context.pipeline.year_tolerance < 0 {
        return Err(ClientError::context_config_invalid(
            path,
            "`pipeline.year_tolerance` must not be negative.",
        ));
    }

    Ok(context)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{DEFAULT_ADDRESS_CHUNK_SIZE, DEFAULT_YEAR_TOLERANCE, parse_context};

    #[test]
    fn minimal_context_gets_defaults() {
        let parsed = parse_context(
            "id = \"ctx-1\"\n[organization]\nid = \"org-1\"\ntin = \"7701234567\"\n",
            Path::new("ctx.toml"),
        );
        assert!(parsed.is_ok());
        if let Ok(context) = parsed {
            assert_eq!(context.organization.tin, "7701234567");
            assert!(!context.settings.is_cottage_village);
            assert!(context.settings.address_transform.is_empty());
            assert_eq!(
                context.pipeline.address_chunk_size,
                DEFAULT_ADDRESS_CHUNK_SIZE
            );
            assert_eq!(context.pipeline.year_tolerance, DEFAULT_YEAR_TOLERANCE);
        }
    }

    #[test]
    fn transform_rules_keep_declaration_order() {
        let parsed = parse_context(
            r#"
id = "ctx-1"

[organization]
id = "org-1"
tin = "7701234567"

[settings]
force_category_detect = true

[[settings.address_transform]]
from = "К."
to = ""

[[settings.address_transform]]
from = "r^(УЛ .*)$"
to = "Самара, $1"
"#,
            Path::new("ctx.toml"),
        );
        assert!(parsed.is_ok());
        if let Ok(context) = parsed {
            assert!(context.settings.force_category_detect);
            let froms: Vec<&str> = context
                .settings
                .address_transform
                .iter()
                .map(|rule| rule.from.as_str())
                .collect();
            assert_eq!(froms, vec!["К.", "r^(УЛ .*)$"]);
        }
    }

    #[test]
    fn missing_organization_is_rejected() {
        let parsed = parse_context("id = \"ctx-1\"\n", Path::new("ctx.toml"));
        assert!(parsed.is_err());
        if let Err(error) = parsed {
            assert_eq!(error.code, "context_config_invalid");
            assert!(error.message.contains("ctx.toml"));
        }
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let parsed = parse_context(
            "id = \"ctx\"\n[organization]\nid = \"org\"\n[pipeline]\naddress_chunk_size = 0\n",
            Path::new("ctx.toml"),
        );
        assert!(parsed.is_err());
    }
}
