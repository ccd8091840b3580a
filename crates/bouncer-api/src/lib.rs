//! REST client for the bouncer device-management API.
//!
//! This crate provides:
//! - Wire types for the `{statusCode, message, payload}` envelope protocol
//! - A typed error taxonomy driving user-facing messages
//! - [`AuthClient`]: credential login and refresh-token exchange
//! - [`DeviceClient`]: device listing and block/unblock requests with a
//!   single refresh-and-retry on token expiry

mod auth;
mod device;
mod error;
mod types;

pub use auth::{AuthClient, LoginSession};
pub use device::DeviceClient;
pub use error::{ApiError, ApiResult};
pub use types::{Credentials, Device, DeviceStatus, Envelope, LoginPayload, UserDevice};

pub use bouncer_session::{SessionStore, TokenPair};
