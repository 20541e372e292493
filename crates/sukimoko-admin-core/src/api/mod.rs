//! Authenticated access to the admin REST backend.
//!
//! Every call that needs a credential goes through [`Gateway::send`], which
//! injects the bearer token from the session store and turns a missing or
//! rejected credential into an [`AuthFailure`]. Other statuses come back as
//! ordinary responses for the caller to branch on.

pub mod error;
pub mod gateway;
pub mod transport;

pub use error::{ApiError, AuthFailure, GatewayError};
pub use gateway::Gateway;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
