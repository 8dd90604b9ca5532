//! RPC dispatch and login.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dispatcher` | Request ids, envelope exchange, upgrade retry |
//! | `login` | `Admin.Login` version negotiation |

/// Envelope dispatch and upgrade retry.
pub mod dispatcher;

/// Login version negotiation.
pub mod login;

pub use dispatcher::{
    DEFAULT_UPGRADE_RETRIES, DEFAULT_UPGRADE_RETRY_DELAY, Dispatcher, RetryPolicy,
};
pub use login::{LOGIN_VERSIONS, LoginNegotiator};
