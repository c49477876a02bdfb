use std::time::Duration;

use kirana_orders::services::EngineConfig;
use serde::{Deserialize, Serialize};

/// Application settings, read from the `settings:` block of the loco
/// config. Every knob has a serde default mirroring the documented
/// environment contract, so a minimal config file boots a working dev
/// instance.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct KiranaSettings {
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub collaborators: CollaboratorSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub workers: WorkerSettings,
    #[serde(default)]
    pub outbox: OutboxSettings,
    #[serde(default)]
    pub internal_service_key: String,
}

impl KiranaSettings {
    pub fn from_settings(
        settings: &Option<serde_json::Value>,
    ) -> Result<Self, serde_json::Error> {
        match settings {
            Some(value) => serde_json::from_value(value.clone()),
            None => Ok(Self::default()),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            gateway_secret: self.gateway.key_secret.clone(),
            webhook_secret: self.gateway.webhook_secret.clone(),
            cart_expiry_days: self.engine.cart_expiry_days,
            checkout_expiry: Duration::from_secs(self.engine.checkout_expiry_minutes * 60),
            reservation_ttl: Duration::from_secs(self.engine.inventory_reservation_minutes * 60),
            payment_timeout: Duration::from_secs(self.engine.payment_timeout_minutes * 60),
            return_window_days: self.engine.return_window_days,
            order_auto_confirm_hours: self.engine.order_auto_confirm_hours,
            reconciliation_window_hours: self.engine.payment_reconciliation_window_hours,
            max_items_per_cart: self.engine.max_items_per_cart,
            max_quantity_per_line: self.engine.max_quantity_per_line,
            tz_offset_minutes: self.engine.tz_offset_minutes,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GatewaySettings {
    #[serde(default)]
    pub key_id: String,
    #[serde(default)]
    pub key_secret: String,
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default = "default_gateway_url")]
    pub base_url: String,
    #[serde(default = "default_gateway_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceEndpoint {
    pub base_url: String,
    #[serde(default = "default_service_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ServiceEndpoint {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:0".to_string(),
            timeout_ms: default_service_timeout_ms(),
        }
    }
}

impl ServiceEndpoint {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CollaboratorSettings {
    #[serde(default)]
    pub catalog: ServiceEndpoint,
    #[serde(default)]
    pub pricing: ServiceEndpoint,
    #[serde(default)]
    pub inventory: ServiceEndpoint,
    #[serde(default)]
    pub shipping: ServiceEndpoint,
    #[serde(default)]
    pub notification: ServiceEndpoint,
    #[serde(default)]
    pub invoice_renderer: ServiceEndpoint,
    /// Dev fallback: quote a flat ₹50 instead of calling the courier API.
    #[serde(default)]
    pub shipping_bypass_mode: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    #[serde(default = "default_cart_expiry_days")]
    pub cart_expiry_days: i64,
    #[serde(default = "default_checkout_expiry_minutes")]
    pub checkout_expiry_minutes: u64,
    #[serde(default = "default_reservation_minutes")]
    pub inventory_reservation_minutes: u64,
    #[serde(default = "default_payment_timeout_minutes")]
    pub payment_timeout_minutes: u64,
    #[serde(default = "default_return_window_days")]
    pub return_window_days: i64,
    #[serde(default = "default_auto_confirm_hours")]
    pub order_auto_confirm_hours: i64,
    #[serde(default = "default_reconciliation_window_hours")]
    pub payment_reconciliation_window_hours: i64,
    #[serde(default = "default_max_items_per_cart")]
    pub max_items_per_cart: usize,
    #[serde(default = "default_max_quantity_per_line")]
    pub max_quantity_per_line: i32,
    /// Minutes east of UTC; Asia/Kolkata by default.
    #[serde(default = "default_tz_offset_minutes")]
    pub tz_offset_minutes: i32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).expect("defaults deserialize")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AuthSettings {
    /// Auth-service session introspection endpoint; empty disables the
    /// remote check and trusts the decoded JWT alone.
    #[serde(default)]
    pub introspect_url: String,
    #[serde(default = "default_auth_timeout_ms")]
    pub timeout_ms: u64,
    /// When the auth service misses its deadline: read-only consumer
    /// endpoints may proceed on JWT-only trust; mutating and admin
    /// endpoints always fail closed.
    #[serde(default = "default_true")]
    pub fail_open_reads: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutboxSettings {
    #[serde(default = "default_batch_size")]
    pub relay_batch_size: u64,
    #[serde(default = "default_relay_max_attempts")]
    pub relay_max_attempts: i32,
    #[serde(default = "default_relay_backoff_base_ms")]
    pub relay_backoff_base_ms: u64,
    #[serde(default = "default_relay_backoff_cap_ms")]
    pub relay_backoff_cap_ms: u64,
    #[serde(default = "default_relay_lock_lease_seconds")]
    pub relay_lock_lease_seconds: u64,
    /// Sleep between passes when the table drained empty.
    #[serde(default = "default_relay_idle_ms")]
    pub relay_idle_ms: u64,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).expect("defaults deserialize")
    }
}

impl OutboxSettings {
    pub fn relay_tuning(&self) -> kirana_outbox::RelayTuning {
        kirana_outbox::RelayTuning {
            batch_size: self.relay_batch_size,
            max_attempts: self.relay_max_attempts,
            backoff_base: Duration::from_millis(self.relay_backoff_base_ms),
            backoff_cap: Duration::from_millis(self.relay_backoff_cap_ms),
            lock_lease: Duration::from_secs(self.relay_lock_lease_seconds),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: default_batch_size(),
        }
    }
}

fn default_gateway_url() -> String {
    "https://api.gateway.example".to_string()
}
fn default_gateway_timeout_ms() -> u64 {
    10_000
}
fn default_service_timeout_ms() -> u64 {
    3_000
}
fn default_auth_timeout_ms() -> u64 {
    3_000
}
fn default_cart_expiry_days() -> i64 {
    30
}
fn default_checkout_expiry_minutes() -> u64 {
    30
}
fn default_reservation_minutes() -> u64 {
    30
}
fn default_payment_timeout_minutes() -> u64 {
    15
}
fn default_return_window_days() -> i64 {
    7
}
fn default_auto_confirm_hours() -> i64 {
    6
}
fn default_reconciliation_window_hours() -> i64 {
    48
}
fn default_max_items_per_cart() -> usize {
    50
}
fn default_max_quantity_per_line() -> i32 {
    10
}
fn default_tz_offset_minutes() -> i32 {
    330
}
fn default_true() -> bool {
    true
}
fn default_batch_size() -> u64 {
    100
}
fn default_relay_max_attempts() -> i32 {
    5
}
fn default_relay_backoff_base_ms() -> u64 {
    1_000
}
fn default_relay_backoff_cap_ms() -> u64 {
    60_000
}
fn default_relay_lock_lease_seconds() -> u64 {
    300
}
fn default_relay_idle_ms() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_yield_documented_defaults() {
        let settings = KiranaSettings::from_settings(&None).unwrap();
        assert_eq!(settings.engine.checkout_expiry_minutes, 30);
        assert_eq!(settings.engine.return_window_days, 7);
        assert_eq!(settings.engine.order_auto_confirm_hours, 6);
        assert_eq!(settings.engine.payment_reconciliation_window_hours, 48);
        assert_eq!(settings.engine.tz_offset_minutes, 330);
        assert!(settings.auth.fail_open_reads);
    }

    #[test]
    fn partial_settings_override_only_named_keys() {
        let value = serde_json::json!({
            "engine": { "return_window_days": 14 },
            "internal_service_key": "shh"
        });
        let settings = KiranaSettings::from_settings(&Some(value)).unwrap();
        assert_eq!(settings.engine.return_window_days, 14);
        assert_eq!(settings.engine.checkout_expiry_minutes, 30);
        assert_eq!(settings.internal_service_key, "shh");
    }
}
