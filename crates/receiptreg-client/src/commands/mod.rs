pub mod categories;
pub(crate) mod common;
pub mod properties;
pub mod receipts;
pub mod register;
