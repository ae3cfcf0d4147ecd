//! Domain models for packy-usage.
//!
//! - [`budget`] - Budget snapshot types (BudgetSnapshot, BudgetPeriod, Severity)

mod budget;

pub use budget::{percentage_of, BudgetPeriod, BudgetSnapshot, OpusStatus, Severity};
