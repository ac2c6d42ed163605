use std::collections::HashMap;

use serde_json::json;

use crate::model::{BillingRecipient, non_empty};
use crate::register::errors::{ErrorCode, Problem, ProblemCode};
use crate::register::record::ReceiptBatch;
use crate::register::resolver::{ResolveEnv, Resolver, ResolverBase, StageReport, StageResult};
use crate::services::{BankInfo, OrganizationInfo};
use crate::store::{EntityKind, FieldSet};
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Resolved { id: String, is_approved: bool },
    Failed { code: ErrorCode, cause: String },
}

/// Payee details gathered for one bank account.
#[derive(Debug, Clone, Default)]
struct PayeeDetails {
    bank_account: String,
    routing_number: String,
    tin: String,
    bank: BankInfo,
    organization: OrganizationInfo,
}

pub struct RecipientResolver {
    base: ResolverBase,
    organization_tin: String,
    recipients: Vec<BillingRecipient>,
}

impl RecipientResolver {
    pub fn new() -> Self {
        Self {
            base: ResolverBase::new("recipient"),
            organization_tin: String::new(),
            recipients: Vec::new(),
        }
    }

    pub fn is_approved(&self, tin: &str) -> bool {
        !tin.is_empty() && tin == self.organization_tin
    }

    fn lookup(&self, env: &ResolveEnv<'_>, details: &mut PayeeDetails) -> Result<(), Resolution> {
        details.bank = env
            .bank_lookup
            .get_bank_info(&details.routing_number)
            .map_err(|error| Resolution::Failed {
                code: ErrorCode::BankFoundError,
                cause: error.to_string(),
            })?;
        if details.tin.is_empty() {
            return Ok(());
        }
        details.organization = env
            .organization_lookup
            .get_organization_info(&details.tin)
            .map_err(|error| Resolution::Failed {
                code: ErrorCode::OrganizationFoundError,
                cause: error.to_string(),
            })?;
        Ok(())
    }

    fn upsert(&mut self, env: &ResolveEnv<'_>, details: &PayeeDetails) -> Result<Resolution, String> {
        let is_approved = self.is_approved(&details.tin);
        let fields = FieldSet::new()
            .text("name", Some(&details.organization.name))
            .text("bank_name", Some(&details.bank.bank_name))
            .text("bank_account", Some(&details.bank_account))
            .text("tin", Some(&details.tin))
            .text("iec", Some(&details.organization.iec))
            .text("bic", Some(&details.routing_number))
            .text("offsetting_account", Some(&details.bank.offsetting_account))
            .text("territory_code", Some(&details.organization.territory_code))
            .flag("is_approved", is_approved);

        let existing = self
            .recipients
            .iter()
            .position(|recipient| recipient.bank_account == details.bank_account);

        let id = match existing {
            Some(position) => {
                let recipient = self.recipients[position].clone();
                let input = self.base.build_update_input(fields, &recipient);
                if !input.is_empty() {
                    env.store
                        .update(EntityKind::Recipient, &recipient.id, &input)
                        .map_err(|error| error.to_string())?;
                    let refreshed = env
                        .store
                        .get_recipient(&recipient.id)
                        .map_err(|error| error.to_string())?
                        .ok_or_else(|| format!("recipient `{}` vanished after update", recipient.id))?;
                    self.recipients[position] = refreshed;
                }
                recipient.id
            }
            None => {
                let input = self.base.build_create_input(fields);
                let id = env
                    .store
                    .create(EntityKind::Recipient, env.context_id(), &input)
                    .map_err(|error| error.to_string())?;
                self.base.mark_created();
                let created = env
                    .store
                    .get_recipient(&id)
                    .map_err(|error| error.to_string())?
                    .ok_or_else(|| format!("recipient `{id}` missing after create"))?;
                self.recipients.push(created);
                id
            }
        };

        Ok(Resolution::Resolved { id, is_approved })
    }

    fn resolve(&mut self, env: &ResolveEnv<'_>, mut details: PayeeDetails) -> Resolution {
        if let Err(failed) = self.lookup(env, &mut details) {
            return failed;
        }
        match self.upsert(env, &details) {
            Ok(resolution) => resolution,
            Err(cause) => Resolution::Failed {
                code: ErrorCode::RecipientSaveFailed,
                cause,
            },
        }
    }
}

impl Default for RecipientResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for RecipientResolver {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn init(&mut self, env: &ResolveEnv<'_>) -> ClientResult<()> {
        self.organization_tin = env.context.organization.tin.trim().to_string();
        self.recipients = env
            .store
            .recipients(env.context_id())
            .map_err(|error| ClientError::reference_data_unavailable(self.base.name(), &error.message))?;
        Ok(())
    }

    fn process_receipts(&mut self, env: &ResolveEnv<'_>, batch: &mut ReceiptBatch) -> StageResult {
        let mut resolved: HashMap<String, Resolution> = HashMap::new();
        let mut result = StageResult::default();

        for record in batch.records_mut() {
            let index = record.index();
            let raw = record.raw();
            let Some(bank_account) = non_empty(raw.bank_account.as_deref()).map(ToString::to_string) else {
                continue;
            };

            let resolution = match resolved.get(&bank_account) {
                Some(resolution) => resolution.clone(),
                None => {
                    let details = PayeeDetails {
                        bank_account: bank_account.clone(),
                        routing_number: non_empty(raw.routing_number.as_deref())
                            .unwrap_or_default()
                            .to_string(),
                        tin: non_empty(raw.tin.as_deref()).unwrap_or_default().to_string(),
                        ..PayeeDetails::default()
                    };
                    let resolution = self.resolve(env, details);
                    resolved.insert(bank_account.clone(), resolution.clone());
                    resolution
                }
            };

            match resolution {
                Resolution::Resolved { id, is_approved } => {
                    if !is_approved {
                        record.add_problem(Problem {
                            code: ProblemCode::RecipientIsNotApproved,
                            params: json!({ "bankAccount": bank_account }),
                        });
                    }
                    tracing::debug!(index, recipient = %id, is_approved, "recipient resolved");
                    record.set_receiver(id);
                    result.succeed(index);
                }
                Resolution::Failed { code, cause } => {
                    result.fail(self.base.error(code, index, &cause));
                }
            }
        }

        result
    }

    fn report(&self) -> StageReport {
        self.base.report()
    }
}
