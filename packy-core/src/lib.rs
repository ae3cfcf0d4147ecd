// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Packy Core
//!
//! Core types shared by every `packy-usage` crate:
//!
//! - Budget models (daily and monthly spend, Opus entitlement)
//! - The classified error taxonomy
//! - Credential detection and expiry strategies
//! - A clock abstraction for time-dependent logic
//!
//! ## Key Types
//!
//! ### Budget
//! - [`BudgetSnapshot`] - Normalized result of one successful fetch
//! - [`BudgetPeriod`] - Used / total / percentage for one period
//! - [`Severity`] - Display bucket derived from a percentage
//!
//! ### Credentials
//! - [`TokenKind`] - API key or JWT
//! - [`TokenValidator`] - Per-format detection and expiry strategy
//! - [`Credential`] - Raw secret plus its format, with a redacted `Debug`
//!
//! ### Errors
//! - [`ClassifiedError`] - Tagged failure (api, auth, network, validation, unknown)
//! - [`ErrorKind`] - The tag alone

pub mod clock;
pub mod error;
pub mod models;
pub mod token;

// Re-export error types
pub use error::{BoxError, ClassifiedError, ErrorKind};

// Re-export model types
pub use models::{percentage_of, BudgetPeriod, BudgetSnapshot, OpusStatus, Severity};

// Re-export token types
pub use token::{
    detect, validate_token_input, ApiKeyValidator, Credential, JwtValidator, TokenKind,
    TokenValidator, API_KEY_PREFIX,
};

// Re-export clock types
pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
