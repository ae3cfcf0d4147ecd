//! Host APIs used by the credential store and API client.
//!
//! - [`keychain`] - Secure secret storage (system keychain, in-memory)
//! - [`http`] - HTTP client with tracing, timeout, and proxy

pub mod http;
pub mod keychain;

// Re-export key types
pub use http::{HttpClient, HttpOptions};
pub use keychain::{MemoryKeychain, SecretStorage, SystemKeychain};
