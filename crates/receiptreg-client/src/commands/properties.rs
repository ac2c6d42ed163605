use std::path::Path;

use crate::commands::common::open_store;
use crate::config::load_context;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{PropertyAddData, PropertyListData};
use crate::services::local_address_key;
use crate::store::Store;
use crate::{ClientError, ClientResult};

#[derive(Debug)]
pub struct PropertyAddOptions<'a> {
    pub context_path: &'a Path,
    pub address: String,
    pub address_key: Option<String>,
    pub home_override: Option<&'a Path>,
}

/// Registers a building as owned by the context's organization. Without an
/// explicit key the offline normalizer's key is used, so later batches with
/// the same address match it.
pub fn add(options: PropertyAddOptions<'_>) -> ClientResult<SuccessEnvelope> {
    let context = load_context(options.context_path)?;
    let address = options.address.trim();
    if address.is_empty() {
        return Err(ClientError::invalid_argument_for_command(
            "Property address must not be empty.",
            Some("property add"),
        ));
    }

    let address_key = match options.address_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => local_address_key(address).ok_or_else(|| {
            ClientError::invalid_argument_for_command(
                &format!("Address `{address}` has no usable tokens to derive a key from."),
                Some("property add"),
            )
        })?,
    };

    let (_, store) = open_store(options.home_override)?;
    let property = store.add_organization_property(&context.organization.id, address, &address_key)?;
    tracing::info!(organization = %context.organization.id, key = %property.address_key, "organization property added");
    success(
        "property add",
        PropertyAddData {
            organization_id: context.organization.id,
            property,
        },
    )
}

pub fn list(context_path: &Path) -> ClientResult<SuccessEnvelope> {
    list_with_home_override(context_path, None)
}

#[doc(hidden)]
pub fn list_with_home_override(
    context_path: &Path,
    home_override: Option<&Path>,
) -> ClientResult<SuccessEnvelope> {
    let context = load_context(context_path)?;
    let (_, store) = open_store(home_override)?;
    let organization_properties = store.organization_properties(&context.organization.id)?;
    let billing_properties = store.properties(&context.id)?;
    success(
        "property list",
        PropertyListData {
            context_id: context.id,
            organization_id: context.organization.id,
            organization_properties,
            billing_properties,
        },
    )
}
