//! Device listing and block/unblock requests.

use crate::auth::AuthClient;
use crate::error::{ApiError, ApiResult, Endpoint};
use crate::types::{DeviceStatus, Envelope, UserDevice};
use bouncer_session::SessionStore;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Client for the device endpoints.
///
/// Consumes the injected [`SessionStore`]. On a single 401 from an
/// authenticated call it delegates to [`AuthClient::refresh`] and retries
/// exactly once; any further failure propagates and clears the session.
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
    auth: AuthClient,
    /// Serializes check-then-refresh-then-retry so concurrent requests
    /// cannot trigger overlapping refreshes.
    refresh_gate: Mutex<()>,
}

impl DeviceClient {
    /// Create a new device client against `base_url`.
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        session: SessionStore,
        auth: AuthClient,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            auth,
            refresh_gate: Mutex::new(()),
        }
    }

    /// Fetch the user's device list.
    ///
    /// Requires an authenticated session. A 401 triggers one refresh and
    /// one retry; a second 401 propagates as `TokenExpired`.
    pub async fn list_devices(&self) -> ApiResult<Vec<UserDevice>> {
        let Some(tokens) = self.session.current() else {
            return Err(ApiError::Unauthenticated);
        };

        match self.fetch_devices(&tokens.access_token).await {
            Ok(devices) => Ok(devices),
            Err(ApiError::TokenExpired) => {
                debug!("Access token rejected, refreshing once");
                let result = match self.refresh_access_token(&tokens.access_token).await {
                    Ok(token) => self.fetch_devices(&token).await,
                    Err(err) => Err(err),
                };
                if result.is_err() {
                    self.session.clear();
                }
                result
            }
            Err(err) => {
                self.session.clear();
                Err(err)
            }
        }
    }

    /// Request the opposite of `current_status` for a device.
    ///
    /// `BLOCKED` devices get an unblock request; anything else gets a
    /// block request. Returns the status the backend is expected to
    /// converge to, for use by the reconciliation loop.
    ///
    /// Requires an authenticated session; there is no implicit login.
    ///
    /// Not idempotent: the direction comes from the caller's last observed
    /// status, not a server-side re-read, so two rapid calls with the same
    /// stale status issue the same action twice.
    pub async fn set_device_status(
        &self,
        device_id: &str,
        current_status: DeviceStatus,
    ) -> ApiResult<DeviceStatus> {
        let Some(tokens) = self.session.current() else {
            warn!(device_id, "Toggle requested without a session");
            return Err(ApiError::Unauthenticated);
        };

        let (action, expected) = match current_status {
            DeviceStatus::Blocked => ("unblock", DeviceStatus::Unblocked),
            _ => ("block", DeviceStatus::Blocked),
        };
        let url = format!("{}/tcp-device/{}/{}", self.base_url, device_id, action);
        info!(device_id, action, "Requesting device state change");

        match self.put_action(&url, &tokens.access_token).await {
            Ok(()) => Ok(expected),
            Err(ApiError::TokenExpired) => {
                debug!(device_id, "Access token rejected, refreshing once");
                let result = match self.refresh_access_token(&tokens.access_token).await {
                    Ok(token) => self.put_action(&url, &token).await,
                    Err(err) => Err(err),
                };
                if result.is_err() {
                    self.session.clear();
                }
                result.map(|()| expected)
            }
            Err(err) => {
                self.session.clear();
                Err(err)
            }
        }
    }

    /// Perform a single gated refresh and return the new access token.
    ///
    /// `stale` is the access token the server just rejected. A caller that
    /// waited on the gate behind another refresh finds the stored token
    /// already rotated and reuses it; one that waited behind a failed
    /// refresh finds the session cleared and gets `Unauthenticated`.
    async fn refresh_access_token(&self, stale: &str) -> ApiResult<String> {
        let _gate = self.refresh_gate.lock().await;
        match self.session.current() {
            Some(pair) if pair.access_token != stale => Ok(pair.access_token),
            Some(_) => Ok(self.auth.refresh().await?.access_token),
            None => Err(ApiError::Unauthenticated),
        }
    }

    async fn fetch_devices(&self, access_token: &str) -> ApiResult<Vec<UserDevice>> {
        let url = format!("{}/user-device", self.base_url);
        debug!(%url, "Fetching device list");

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, "Device list request failed");
            return Err(ApiError::from_status(Endpoint::Authenticated, status, body));
        }

        let envelope: Envelope<Vec<UserDevice>> =
            response.json().await.map_err(ApiError::from_transport)?;
        debug!(count = envelope.payload.len(), "Fetched devices");
        Ok(envelope.payload)
    }

    async fn put_action(&self, url: &str, access_token: &str) -> ApiResult<()> {
        let response = self
            .http
            .put(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, "Device state change rejected");
            return Err(ApiError::from_status(Endpoint::Authenticated, status, body));
        }

        Ok(())
    }
}
