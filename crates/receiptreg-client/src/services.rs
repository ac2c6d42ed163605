use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::config::Directory;
use crate::register::address::is_valid_global_id;
use crate::register::finder::address_tokens;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("no record found for `{0}`")]
    NotFound(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHelpers {
    pub tin: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkSearchRequest {
    pub items: Vec<String>,
    pub helpers: SearchHelpers,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankInfo {
    pub bank_name: String,
    pub offsetting_account: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationInfo {
    pub name: String,
    pub iec: String,
    pub territory_code: String,
}

/// Address normalization. The response is JSON shaped as
/// `{ map: { item: { data: { addressKey } } }, addresses: { key: { address } } }`
/// and is read leniently.
pub trait AddressService {
    fn bulk_search(&self, request: &BulkSearchRequest) -> Result<Value, ServiceError>;
}

pub trait BankLookup {
    fn get_bank_info(&self, routing_number: &str) -> Result<BankInfo, ServiceError>;
}

pub trait OrganizationLookup {
    fn get_organization_info(&self, tin: &str) -> Result<OrganizationInfo, ServiceError>;
}

/// Key the offline address service assigns to an address: its tokens
/// joined with `-`, or the lowercased id for `fiasId:` items.
pub fn local_address_key(address: &str) -> Option<String> {
    if let Some(global_id) = address.strip_prefix("fiasId:") {
        return is_valid_global_id(global_id).then(|| global_id.trim().to_lowercase());
    }
    let tokens = address_tokens(address);
    if tokens.is_empty() {
        return None;
    }
    Some(tokens.join("-"))
}

/// Offline normalizer: every address with at least one token is recognized
/// and keyed by its tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalAddressService;

impl AddressService for LocalAddressService {
    fn bulk_search(&self, request: &BulkSearchRequest) -> Result<Value, ServiceError> {
        let mut map = Map::new();
        let mut addresses = Map::new();
        for item in &request.items {
            let Some(address_key) = local_address_key(item) else {
                continue;
            };
            map.insert(item.clone(), json!({ "data": { "addressKey": address_key } }));
            addresses
                .entry(address_key)
                .or_insert_with(|| json!({ "address": item }));
        }
        Ok(json!({ "map": map, "addresses": addresses }))
    }
}

/// Bank and organization data read from the billing context file.
#[derive(Debug, Clone, Default)]
pub struct LocalDirectory {
    banks: HashMap<String, BankInfo>,
    organizations: HashMap<String, OrganizationInfo>,
}

impl LocalDirectory {
    pub fn from_directory(directory: &Directory) -> Self {
        let banks = directory
            .banks
            .iter()
            .map(|bank| {
                (
                    bank.routing_number.trim().to_string(),
                    BankInfo {
                        bank_name: bank.bank_name.clone(),
                        offsetting_account: bank.offsetting_account.clone(),
                    },
                )
            })
            .collect();
        let organizations = directory
            .organizations
            .iter()
            .map(|organization| {
                (
                    organization.tin.trim().to_string(),
                    OrganizationInfo {
                        name: organization.name.clone(),
                        iec: organization.iec.clone(),
                        territory_code: organization.territory_code.clone(),
                    },
                )
            })
            .collect();
        Self {
            banks,
            organizations,
        }
    }
}

impl BankLookup for LocalDirectory {
    fn get_bank_info(&self, routing_number: &str) -> Result<BankInfo, ServiceError> {
        self.banks
            .get(routing_number.trim())
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(routing_number.to_string()))
    }
}

impl OrganizationLookup for LocalDirectory {
    fn get_organization_info(&self, tin: &str) -> Result<OrganizationInfo, ServiceError> {
        self.organizations
            .get(tin.trim())
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(tin.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AddressService, BankLookup, BulkSearchRequest, LocalAddressService, LocalDirectory,
        OrganizationLookup, SearchHelpers, ServiceError, local_address_key,
    };
    use crate::config::{BankEntry, Directory, OrganizationEntry};

    #[test]
    fn local_keys_ignore_punctuation_and_case() {
        assert_eq!(
            local_address_key("ул.Ленина, д.5"),
            local_address_key("УЛ ЛЕНИНА Д 5")
        );
        assert_eq!(
            local_address_key("fiasId:B746E6BD-E02B-4987-BB1C-BB9DD808F909"),
            Some("b746e6bd-e02b-4987-bb1c-bb9dd808f909".to_string())
        );
        assert_eq!(local_address_key("  , . "), None);
    }

    #[test]
    fn bulk_search_skips_unrecognizable_items() {
        let response = LocalAddressService.bulk_search(&BulkSearchRequest {
            items: vec!["ул.Ленина, д.5".to_string(), "-".to_string()],
            helpers: SearchHelpers {
                tin: "7701234567".to_string(),
            },
        });
        assert!(response.is_ok());
        if let Ok(response) = response {
            let key = &response["map"]["ул.Ленина, д.5"]["data"]["addressKey"];
            assert_eq!(key, "ул-ленина-5");
            assert_eq!(response["addresses"]["ул-ленина-5"]["address"], "ул.Ленина, д.5");
            assert!(response["map"].get("-").is_none());
        }
    }

    #[test]
    fn directory_lookups_report_missing_entries() {
        let directory = LocalDirectory::from_directory(&Directory {
            banks: vec![BankEntry {
                routing_number: "044525225".to_string(),
                bank_name: "Sample Bank".to_string(),
                offsetting_account: "30101810400000000225".to_string(),
            }],
            organizations: vec![OrganizationEntry {
                tin: "7701234567".to_string(),
                name: "Sample Management".to_string(),
                iec: "770101001".to_string(),
                territory_code: "45000000".to_string(),
            }],
        });

        assert_eq!(
            directory.get_bank_info("044525225").map(|bank| bank.bank_name),
            Ok("Sample Bank".to_string())
        );
        assert_eq!(
            directory.get_bank_info("000000000"),
            Err(ServiceError::NotFound("000000000".to_string()))
        );
        assert_eq!(
            directory
                .get_organization_info(" 7701234567 ")
                .map(|organization| organization.iec),
            Ok("770101001".to_string())
        );
    }
}
