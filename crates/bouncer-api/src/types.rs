//! Wire types for the bouncer device-management API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard response envelope: `{statusCode, message, payload}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    /// Application-level status code echoed by the backend.
    pub status_code: i32,
    /// Human-readable message from the backend.
    #[serde(default)]
    pub message: Option<String>,
    /// The actual response data.
    pub payload: T,
}

/// Login credentials. Transient; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Payload of a successful credential login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Block/unblock state reported by the backend for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Blocked,
    Unblocked,
    /// Any other server-defined state.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DeviceStatus::Blocked => "blocked",
            DeviceStatus::Unblocked => "unblocked",
            DeviceStatus::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// A bouncer device as reported by the backend.
///
/// Server-owned; the client treats everything except `status` as
/// read-only, and `status` only changes through the block/unblock
/// endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub serial_no: String,
    pub nick_name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub status: DeviceStatus,
    #[serde(default)]
    pub battery_voltage: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub last_connection_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub gsm_signal: Option<i32>,
}

/// The per-user association wrapping a device; the unit returned by the
/// listing endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDevice {
    pub id: String,
    pub is_favorite: bool,
    pub relationship_type: String,
    pub status: String,
    pub device: Device,
}
