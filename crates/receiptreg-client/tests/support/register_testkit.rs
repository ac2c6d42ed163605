use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use receiptreg_client::commands::register::{self, RegisterOptions};
use receiptreg_client::services::{AddressService, BulkSearchRequest, ServiceError};
use serde_json::Value;
use tempfile::{Builder, TempDir};

pub const CONTEXT_ID: &str = "ctx-main";
pub const ORGANIZATION_TIN: &str = "7701234567";

pub const BASIC_CONTEXT: &str = r#"
id = "ctx-main"

[organization]
id = "org-main"
tin = "7701234567"

[[directory.banks]]
routing_number = "044525225"
bank_name = "Sample Bank"
offsetting_account = "30101810400000000225"

[[directory.organizations]]
tin = "7701234567"
name = "Sample Management"
iec = "770101001"
territory_code = "45000000"

[[directory.organizations]]
tin = "7709876543"
name = "Other Supplier"
"#;

pub struct Workspace {
    _dir: TempDir,
    pub home: PathBuf,
    pub context_path: PathBuf,
}

impl Workspace {
    pub fn new(context_toml: &str) -> std::io::Result<Self> {
        let dir = Builder::new().prefix("receiptreg-test").tempdir()?;
        let home = dir.path().join("registry-home");
        fs::create_dir_all(&home)?;
        let context_path = dir.path().join("context.toml");
        fs::write(&context_path, context_toml)?;
        Ok(Self {
            _dir: dir,
            home,
            context_path,
        })
    }

    pub fn root(&self) -> &Path {
        self._dir.path()
    }

    /// Registers `batch` (passed as stdin) and returns the envelope data.
    pub fn register(&self, batch: &Value, now: DateTime<Utc>) -> Option<Value> {
        let result = register::run_with_options(RegisterOptions {
            path: "-".to_string(),
            context_path: self.context_path.clone(),
            home_override: Some(&self.home),
            stdin_override: Some(batch.to_string()),
            now: Some(now),
        });
        assert!(result.is_ok(), "register failed: {:?}", result.err());
        result.ok().map(|envelope| envelope.data)
    }
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).single() {
        Some(moment) => moment,
        None => panic!("invalid fixture date {year}-{month}-{day}"),
    }
}

pub fn stage<'a>(data: &'a Value, name: &str) -> Option<&'a Value> {
    data["stages"]
        .as_array()?
        .iter()
        .find(|stage| stage["stage"] == name)
}

pub fn total(data: &Value, field: &str) -> i64 {
    data["stages"]
        .as_array()
        .map(|stages| {
            stages
                .iter()
                .filter_map(|stage| stage[field].as_i64())
                .sum()
        })
        .unwrap_or_default()
}

/// Address service whose every call fails.
pub struct UnavailableAddressService;

impl AddressService for UnavailableAddressService {
    fn bulk_search(&self, _request: &BulkSearchRequest) -> Result<Value, ServiceError> {
        Err(ServiceError::Unavailable("address service offline".to_string()))
    }
}
