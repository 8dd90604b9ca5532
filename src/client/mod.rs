//! Authenticated connections and facades.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Connection`] | Open, authenticated API connection |
//! | [`ConnectionBuilder`] | Fluent connection configuration |
//! | [`FacadeRegistry`] | Facade capability table from login |
//! | [`Facade`] | Facade bound to a connection and version |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for connection configuration.
pub mod builder;

/// Connection aggregate.
pub mod connection;

/// Facade capability table and proxies.
pub mod facade;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionBuilder;
pub use connection::Connection;
pub use facade::{Facade, FacadeRegistry};
