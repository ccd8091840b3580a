//! Command handlers wiring the session, API clients, and reconciler.

use std::sync::Arc;

use anyhow::{bail, Context};
use bouncer_api::{AuthClient, Credentials, DeviceClient, UserDevice};
use bouncer_config_and_utils::Config;
use bouncer_session::SessionStore;
use status_reconcile_worker::{ReconcileConfig, StatusReconciler};
use tokio::sync::mpsc;
use tracing::info;

/// Clients for one CLI invocation. The session lives only as long as the
/// process; nothing is persisted.
struct App {
    auth: AuthClient,
    devices: Arc<DeviceClient>,
}

impl App {
    fn new(config: &Config) -> Self {
        let http = reqwest::Client::new();
        let session = SessionStore::new();
        let auth = AuthClient::new(http.clone(), &config.api_base_url, session.clone());
        let devices = Arc::new(DeviceClient::new(
            http,
            &config.api_base_url,
            session,
            auth.clone(),
        ));
        Self { auth, devices }
    }

    async fn sign_in(&self, email: String, password: String) -> anyhow::Result<String> {
        let outcome = self
            .auth
            .login(&Credentials { email, password })
            .await
            .context("login failed")?;
        Ok(outcome.user_id)
    }
}

/// Verify credentials against the API.
pub async fn login(config: &Config, email: String, password: String) -> anyhow::Result<()> {
    let app = App::new(config);
    let user_id = app.sign_in(email, password).await?;
    println!("Signed in as {user_id}");
    Ok(())
}

/// List the devices tied to the account.
pub async fn devices(config: &Config, email: String, password: String) -> anyhow::Result<()> {
    let app = App::new(config);
    app.sign_in(email, password).await?;

    let rows = app.devices.list_devices().await?;
    print_devices(&rows);
    Ok(())
}

/// Toggle a device's block state and poll until the backend confirms.
pub async fn toggle(
    config: &Config,
    device_id: String,
    email: String,
    password: String,
) -> anyhow::Result<()> {
    let app = App::new(config);
    app.sign_in(email, password).await?;

    let rows = app.devices.list_devices().await?;
    let row = rows
        .iter()
        .find(|row| row.device.id == device_id)
        .with_context(|| format!("no device with id {device_id}"))?;
    let nickname = row.device.nick_name.clone();
    let current = row.device.status;

    let expected = app.devices.set_device_status(&device_id, current).await?;
    info!(%device_id, %expected, "State change accepted, waiting for confirmation");

    let (events, mut rx) = mpsc::channel(1);
    let reconciler = StatusReconciler::new(
        ReconcileConfig::default(),
        Arc::clone(&app.devices),
        events,
    );
    let handle = reconciler
        .watch(&device_id, expected, nickname)
        .expect("fresh reconciler cannot have a pending watch");
    handle.wait().await;

    let Some(event) = rx.recv().await else {
        bail!("reconciler finished without reporting an outcome");
    };
    println!("{}", event.message());

    // One final refresh so the user sees the settled state.
    let rows = app.devices.list_devices().await?;
    print_devices(&rows);
    Ok(())
}

fn print_devices(rows: &[UserDevice]) {
    if rows.is_empty() {
        println!("No devices on this account.");
        return;
    }

    for row in rows {
        let device = &row.device;
        let battery = device
            .battery_voltage
            .map(|v| format!("{v:.1}V"))
            .unwrap_or_else(|| "-".to_string());
        let signal = device
            .gsm_signal
            .map(|s| format!("{s}dBm"))
            .unwrap_or_else(|| "-".to_string());
        let last_seen = device
            .last_connection_date
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{}  {}  [{}]  serial={}  battery={}  signal={}  last_seen={}",
            device.id, device.nick_name, device.status, device.serial_no, battery, signal, last_seen
        );
    }
}
