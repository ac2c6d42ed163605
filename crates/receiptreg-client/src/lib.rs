pub mod commands;
pub mod config;
pub mod contracts;
pub mod error;
pub mod migrations;
pub mod model;
pub mod register;
pub mod services;
pub mod setup;
pub mod state;
pub mod store;

pub use config::BillingContext;
pub use contracts::envelope::{FailureEnvelope, SuccessEnvelope};
pub use error::{ClientError, ClientResult};
pub use register::record::ReceiptBatch;
pub use register::resolver::ResolveEnv;
pub use register::{RegisterOutcome, register_receipts};

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");
