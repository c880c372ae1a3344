//! Dhcpstorm core library
//!
//! Shared building blocks for the dhcpstorm simulation crates: the
//! workspace error type and the client-identity primitives.

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::MacAddr;
