//! Wire message types.
//!
//! This module defines the JSON envelopes exchanged with the API server.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Client → Server | Facade method call |
//! | `Response` | Server → Client | Result payload or error |
//!
//! The protocol is strictly request/response: one request is in flight at a
//! time and responses arrive in request order.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `login` | `Admin.Login` credential shapes and result |
//! | `request` | Request and Response envelopes |

// ============================================================================
// Submodules
// ============================================================================

/// Login credential shapes and login result.
pub mod login;

/// Request and Response envelope types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use login::{ADMIN_FACADE, AuthCredentials, FacadeVersions, LOGIN_METHOD, LoginResult};
pub use request::{Params, Request, Response, params_from_value};
