use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    WrongMonth,
    WrongYear,
    BillingCategoryNotFound,
    AccountSaveFailed,
    PropertySaveFailed,
    RecipientSaveFailed,
    ReceiptSaveFailed,
    BankFoundError,
    OrganizationFoundError,
    AddressNotRecognizedValue,
    MalformedRecord,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::WrongMonth => "WRONG_MONTH",
            ErrorCode::WrongYear => "WRONG_YEAR",
            ErrorCode::BillingCategoryNotFound => "BILLING_CATEGORY_NOT_FOUND",
            ErrorCode::AccountSaveFailed => "ACCOUNT_SAVE_FAILED",
            ErrorCode::PropertySaveFailed => "PROPERTY_SAVE_FAILED",
            ErrorCode::RecipientSaveFailed => "RECIPIENT_SAVE_FAILED",
            ErrorCode::ReceiptSaveFailed => "RECEIPT_SAVE_FAILED",
            ErrorCode::BankFoundError => "BANK_FOUND_ERROR",
            ErrorCode::OrganizationFoundError => "ORGANIZATION_FOUND_ERROR",
            ErrorCode::AddressNotRecognizedValue => "ADDRESS_NOT_RECOGNIZED_VALUE",
            ErrorCode::MalformedRecord => "MALFORMED_RECORD",
        }
    }

    /// Caller-facing text. Internal causes are logged, never returned.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::WrongMonth => "Receipt month is missing or out of range.",
            ErrorCode::WrongYear => "Receipt year is missing or too far from the current year.",
            ErrorCode::BillingCategoryNotFound => "Declared billing category does not exist.",
            ErrorCode::AccountSaveFailed => "Billing account could not be saved.",
            ErrorCode::PropertySaveFailed => "Billing property could not be saved.",
            ErrorCode::RecipientSaveFailed => "Billing recipient could not be saved.",
            ErrorCode::ReceiptSaveFailed => "Billing receipt could not be saved.",
            ErrorCode::BankFoundError => "Bank lookup by routing number failed.",
            ErrorCode::OrganizationFoundError => "Organization lookup by tin failed.",
            ErrorCode::AddressNotRecognizedValue => "Address was not recognized.",
            ErrorCode::MalformedRecord => "Receipt record is not an object or has fields of the wrong type.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure attached to a single batch record.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("record {index}: {code}: {message}")]
pub struct RecordError {
    pub code: ErrorCode,
    pub index: i64,
    pub message: String,
}

impl RecordError {
    pub fn new(code: ErrorCode, index: i64) -> Self {
        Self {
            code,
            index,
            message: code.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemCode {
    NoPropertyInOrganization,
    RecipientIsNotApproved,
}

impl ProblemCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemCode::NoPropertyInOrganization => "NO_PROPERTY_IN_ORGANIZATION",
            ProblemCode::RecipientIsNotApproved => "RECIPIENT_IS_NOT_APPROVED",
        }
    }
}

/// Non-fatal finding surfaced alongside a resolved record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub code: ProblemCode,
    pub params: Value,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ErrorCode, RecordError};

    #[test]
    fn record_errors_serialize_with_wire_codes() {
        let error = RecordError::new(ErrorCode::WrongMonth, 4);
        assert_eq!(error.to_string(), format!("record 4: WRONG_MONTH: {}", error.message));
        let encoded = serde_json::to_value(&error);
        assert!(encoded.is_ok());
        if let Ok(encoded) = encoded {
            assert_eq!(encoded["code"], json!("WRONG_MONTH"));
            assert_eq!(encoded["index"], json!(4));
        }
    }
}
