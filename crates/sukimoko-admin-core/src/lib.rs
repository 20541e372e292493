//! Core library for the Sukimoko admin client.
//!
//! Holds everything that touches the bearer credential:
//! - `auth`: the session store, its persistence adapters, identity decoding
//!   and the login/logout flow
//! - `api`: the authenticated request gateway and the HTTP transport behind it
//! - `navigator`: the redirect capability the gateway and login flow report to
//! - `config`: application configuration
//!
//! Page-level views are not part of this crate. They receive an
//! [`AdminContext`] and issue their calls through its [`Gateway`].

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod navigator;

pub use api::{ApiError, ApiRequest, ApiResponse, AuthFailure, Gateway, GatewayError, HttpTransport};
pub use auth::{AuthState, Identity, LoginFlow, LoginForm, SessionStore};
pub use config::Config;
pub use context::AdminContext;
pub use navigator::{Navigator, RecordingNavigator, HOME_PATH, LOGIN_PATH};
