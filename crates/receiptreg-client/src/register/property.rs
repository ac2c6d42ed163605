use std::collections::{HashMap, HashSet};

use serde_json::{Value, json};

use crate::config::BillingContext;
use crate::model::{BillingProperty, OrganizationProperty, RawReceipt, UnitType, non_empty};
use crate::register::address::{
    AddressTransform, is_valid_global_id, normalize_property_global_id, parse_address, parse_unit,
};
use crate::register::errors::{ErrorCode, Problem, ProblemCode};
use crate::register::finder::PropertyFinder;
use crate::register::record::{
    AddressResolve, ChosenAddress, PropertyAddress, ReceiptBatch, ResolvedProperty, WorkingRecord,
};
use crate::register::resolver::{ResolveEnv, Resolver, ResolverBase, StageReport, StageResult};
use crate::services::{BulkSearchRequest, SearchHelpers};
use crate::store::{EntityKind, FieldSet};
use crate::{ClientError, ClientResult};

const COTTAGE_DEFAULT_UNIT_NAME: &str = "1";

pub struct PropertyResolver {
    base: ResolverBase,
    transform: AddressTransform,
    is_cottage_village: bool,
    chunk_size: usize,
    tin: String,
    organization_keys: HashMap<String, String>,
    finder: PropertyFinder,
    properties: Vec<BillingProperty>,
}

impl PropertyResolver {
    pub fn new(context: &BillingContext) -> Self {
        Self {
            base: ResolverBase::new("property"),
            transform: AddressTransform::from_rules(&context.settings.address_transform),
            is_cottage_village: context.settings.is_cottage_village,
            chunk_size: context.pipeline.address_chunk_size.max(1),
            tin: context.organization.tin.clone(),
            organization_keys: HashMap::new(),
            finder: PropertyFinder::default(),
            properties: Vec::new(),
        }
    }

    fn load_organization_properties(&mut self, properties: &[OrganizationProperty]) {
        self.organization_keys = properties
            .iter()
            .map(|property| (property.address_key.clone(), property.address.clone()))
            .collect();
        self.finder = PropertyFinder::new(properties);
    }

    /// Address candidates and the best-guess unit for one record.
    pub fn get_address_from_receipt(&self, raw: &RawReceipt) -> AddressResolve {
        let address_input = raw.address.as_deref().map(str::trim).unwrap_or_default();

        if self.is_cottage_village {
            let parsed = parse_address(address_input);
            let (unit_name, unit_type) = if parsed.unit_name.is_empty() {
                (COTTAGE_DEFAULT_UNIT_NAME.to_string(), Some(UnitType::Flat))
            } else {
                (parsed.unit_name, parsed.unit_type.or(Some(UnitType::Flat)))
            };
            let addresses = if parsed.house.is_empty() {
                Vec::new()
            } else {
                vec![parsed.house]
            };
            return AddressResolve {
                addresses,
                unit_name,
                unit_type,
            };
        }

        let meta = &raw.address_meta;
        let unit_name_input = non_empty(meta.unit_name.as_deref()).unwrap_or_default();
        let unit_type_input = non_empty(meta.unit_type.as_deref()).unwrap_or_default();

        let mut addresses = Vec::new();
        let mut unit_names = vec![unit_name_input.to_string()];
        let mut unit_types = Vec::new();

        if !unit_type_input.is_empty() {
            let unit_type = UnitType::from_name(unit_type_input)
                .or_else(|| parse_unit(&format!("{unit_type_input} {unit_name_input}")).1);
            unit_types.push(unit_type);
        }

        let mut global_id = non_empty(meta.global_id.as_deref())
            .unwrap_or_default()
            .to_string();
        let mut free_text = address_input;
        if is_valid_global_id(address_input) {
            global_id = address_input.to_string();
            free_text = "";
        }

        if !global_id.is_empty() && is_valid_global_id(&global_id) {
            let transformed = self.transform.apply(&global_id);
            if transformed.contains(',') {
                let parsed = parse_address(&transformed);
                unit_names.push(parsed.unit_name);
                unit_types.push(parsed.unit_type);
                addresses.push(format!("fiasId:{}", parsed.house.to_lowercase()));
            } else {
                addresses.push(format!("fiasId:{}", transformed.to_lowercase()));
            }
        }

        if !free_text.is_empty() {
            let transformed = self.transform.apply(free_text);
            if !unit_name_input.is_empty() && !unit_type_input.is_empty() {
                addresses.push(transformed);
            } else {
                let parsed = parse_address(&transformed);
                unit_names.push(parsed.unit_name);
                unit_types.push(parsed.unit_type);
                addresses.push(parsed.house);
            }
        }

        let known_types: Vec<UnitType> = unit_types.into_iter().flatten().collect();
        let unit_type = known_types
            .iter()
            .copied()
            .find(|unit_type| *unit_type != UnitType::Flat)
            .or_else(|| known_types.first().copied());
        let unit_name = unit_names
            .into_iter()
            .find(|name| !name.is_empty())
            .unwrap_or_default();

        AddressResolve {
            addresses,
            unit_name,
            unit_type,
        }
    }

    /// First candidate owned by the organization, else the first candidate.
    pub fn choose_property_address(&self, candidates: Vec<ChosenAddress>) -> PropertyAddress {
        if let Some(position) = candidates
            .iter()
            .position(|candidate| self.organization_keys.contains_key(&candidate.address_key))
        {
            return PropertyAddress::Matched(candidates[position].clone());
        }
        match candidates.into_iter().next() {
            Some(first) => PropertyAddress::Foreign(first),
            None => PropertyAddress::NotRecognized,
        }
    }

    fn normalize_chunk(&self, env: &ResolveEnv<'_>, items: &[String]) -> HashMap<String, ChosenAddress> {
        let request = BulkSearchRequest {
            items: items.to_vec(),
            helpers: SearchHelpers {
                tin: self.tin.clone(),
            },
        };
        let response = match env.address_service.bulk_search(&request) {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(items = items.len(), %error, "address normalization failed for chunk");
                return HashMap::new();
            }
        };

        items
            .iter()
            .filter_map(|item| read_normalized(&response, item).map(|found| (item.clone(), found)))
            .collect()
    }

    fn resolve_addresses(&self, env: &ResolveEnv<'_>, batch: &mut ReceiptBatch) -> HashMap<i64, PropertyAddress> {
        let mut chosen = HashMap::new();

        if self.is_cottage_village {
            for record in batch.records_mut() {
                let resolve = self.get_address_from_receipt(record.raw());
                let found = resolve
                    .addresses
                    .first()
                    .and_then(|house| self.finder.find(house));
                let property_address = match found {
                    Some(found) => PropertyAddress::Matched(ChosenAddress {
                        address: found.address,
                        address_key: found.address_key,
                    }),
                    None => PropertyAddress::NotRecognized,
                };
                chosen.insert(record.index(), property_address);
                record.set_address_resolve(resolve);
            }
            return chosen;
        }

        let mut to_normalize = Vec::new();
        let mut seen = HashSet::new();
        for record in batch.records_mut() {
            let resolve = self.get_address_from_receipt(record.raw());
            for address in &resolve.addresses {
                if seen.insert(address.clone()) {
                    to_normalize.push(address.clone());
                }
            }
            record.set_address_resolve(resolve);
        }

        let mut normalized = HashMap::new();
        for chunk in to_normalize.chunks(self.chunk_size) {
            normalized.extend(self.normalize_chunk(env, chunk));
        }

        for record in batch.records() {
            let addresses = record
                .address_resolve()
                .map(|resolve| resolve.addresses.as_slice())
                .unwrap_or_default();
            let mut keys = HashSet::new();
            let candidates: Vec<ChosenAddress> = addresses
                .iter()
                .filter_map(|address| normalized.get(address))
                .filter(|found| keys.insert(found.address_key.clone()))
                .cloned()
                .collect();
            chosen.insert(record.index(), self.choose_property_address(candidates));
        }
        chosen
    }

    fn upsert(
        &mut self,
        env: &ResolveEnv<'_>,
        record: &mut WorkingRecord,
        chosen: ChosenAddress,
        updated: &mut HashSet<String>,
    ) -> Result<(), String> {
        let meta = &record.raw().address_meta;
        let import_id = non_empty(meta.import_id.as_deref()).map(ToString::to_string);
        let global_id = normalize_property_global_id(meta.global_id.as_deref());

        let existing = import_id
            .as_deref()
            .and_then(|import_id| {
                self.properties
                    .iter()
                    .position(|property| property.import_id.as_deref() == Some(import_id))
            })
            .or_else(|| {
                self.properties
                    .iter()
                    .position(|property| property.address_key == chosen.address_key)
            });

        if let Some(position) = existing {
            let property = self.properties[position].clone();
            record.set_property(ResolvedProperty {
                id: property.id.clone(),
                address_key: property.address_key.clone(),
            });
            if !updated.insert(property.id.clone()) {
                return Ok(());
            }

            let key_changed = chosen.address_key != property.address_key;
            let address = key_changed.then(|| address_field_value(&chosen));
            let fields = FieldSet::new()
                .text("import_id", import_id.as_deref())
                .text("global_id", global_id.as_deref())
                .text("address", address.as_deref())
                .text("address_key", key_changed.then_some(chosen.address_key.as_str()));
            let input = self.base.build_update_input(fields, &property);
            if input.is_empty() {
                return Ok(());
            }
            env.store
                .update(EntityKind::Property, &property.id, &input)
                .map_err(|error| error.to_string())?;
            let refreshed = env
                .store
                .get_property(&property.id)
                .map_err(|error| error.to_string())?
                .ok_or_else(|| format!("property `{}` vanished after update", property.id))?;
            record.set_property(ResolvedProperty {
                id: refreshed.id.clone(),
                address_key: refreshed.address_key.clone(),
            });
            self.properties[position] = refreshed;
            return Ok(());
        }

        let fields = FieldSet::new()
            .text("address", Some(&address_field_value(&chosen)))
            .text("address_key", Some(&chosen.address_key))
            .text("import_id", import_id.as_deref())
            .text("global_id", global_id.as_deref());
        let input = self.base.build_create_input(fields);
        let id = env
            .store
            .create(EntityKind::Property, env.context_id(), &input)
            .map_err(|error| error.to_string())?;
        self.base.mark_created();
        let created = env
            .store
            .get_property(&id)
            .map_err(|error| error.to_string())?
            .ok_or_else(|| format!("property `{id}` missing after create"))?;
        record.set_property(ResolvedProperty {
            id: created.id.clone(),
            address_key: created.address_key.clone(),
        });
        updated.insert(created.id.clone());
        self.properties.push(created);
        Ok(())
    }
}

/// Keys that are UUIDs are stored as `key:<uuid>` in place of the address.
fn address_field_value(chosen: &ChosenAddress) -> String {
    if is_valid_global_id(&chosen.address_key) && !chosen.address_key.contains(',') {
        return format!("key:{}", chosen.address_key);
    }
    chosen.address.clone()
}

fn read_normalized(response: &Value, item: &str) -> Option<ChosenAddress> {
    let address_key = response
        .get("map")?
        .get(item)?
        .get("data")?
        .get("addressKey")?
        .as_str()?;
    let address = response
        .get("addresses")?
        .get(address_key)?
        .get("address")?
        .as_str()?;
    Some(ChosenAddress {
        address: address.to_string(),
        address_key: address_key.to_string(),
    })
}

impl Resolver for PropertyResolver {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn init(&mut self, env: &ResolveEnv<'_>) -> ClientResult<()> {
        let organization_properties = env
            .store
            .organization_properties(&env.context.organization.id)
            .map_err(|error| ClientError::reference_data_unavailable(self.base.name(), &error.message))?;
        self.load_organization_properties(&organization_properties);
        self.properties = env
            .store
            .properties(env.context_id())
            .map_err(|error| ClientError::reference_data_unavailable(self.base.name(), &error.message))?;
        Ok(())
    }

    fn process_receipts(&mut self, env: &ResolveEnv<'_>, batch: &mut ReceiptBatch) -> StageResult {
        let mut chosen = self.resolve_addresses(env, batch);
        let mut updated = HashSet::new();
        let mut result = StageResult::default();

        for record in batch.records_mut() {
            let index = record.index();
            let addresses = record
                .address_resolve()
                .map(|resolve| resolve.addresses.clone())
                .unwrap_or_default();

            let chosen_address = match chosen.remove(&index) {
                Some(PropertyAddress::Matched(address)) => address,
                Some(PropertyAddress::Foreign(address)) => {
                    record.add_problem(Problem {
                        code: ProblemCode::NoPropertyInOrganization,
                        params: json!({ "addresses": addresses }),
                    });
                    address
                }
                Some(PropertyAddress::NotRecognized) | None => {
                    tracing::warn!(index, ?addresses, "address not recognized");
                    let cause = format!("no normalized candidate among {addresses:?}");
                    result.fail(
                        self.base
                            .error(ErrorCode::AddressNotRecognizedValue, index, &cause),
                    );
                    continue;
                }
            };

            match self.upsert(env, record, chosen_address, &mut updated) {
                Ok(()) => result.succeed(index),
                Err(cause) => {
                    result.fail(self.base.error(ErrorCode::PropertySaveFailed, index, &cause));
                }
            }
        }

        result
    }

    fn report(&self) -> StageReport {
        self.base.report()
    }
}
