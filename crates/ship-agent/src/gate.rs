//! Credential/quota gate checked before any completion call

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Read-only view of a user's quota record.
///
/// The counter is decremented elsewhere (payment webhook path); this
/// subsystem only reads it.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Remaining ships for the user.
    async fn available_ships(&self, user_id: &str) -> Result<i64>;
}

/// Validates a user-supplied API key before it is used for model calls.
#[async_trait]
pub trait KeyValidator: Send + Sync {
    async fn validate(&self, api_key: &str) -> ship_ai::Result<()>;
}

/// Outcome of the gate check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Caller may proceed; `used_override` is true when a user key bypassed
    /// the quota check.
    Proceed { used_override: bool },
    /// No quota and no override key; the client must complete a payment.
    PaymentRequired,
    /// The override key failed validation.
    InvalidKey { message: String },
}

/// Gate applied to every ship request before the loop starts.
///
/// Precedence is explicit: an override key present means the quota check is
/// bypassed entirely. The key must still validate before first use.
pub struct AccessGate {
    quota: Arc<dyn QuotaStore>,
    validator: Arc<dyn KeyValidator>,
}

impl AccessGate {
    pub fn new(quota: Arc<dyn QuotaStore>, validator: Arc<dyn KeyValidator>) -> Self {
        Self { quota, validator }
    }

    /// Decide whether a request may start the conversation loop.
    pub async fn check(
        &self,
        user_id: &str,
        api_key_override: Option<&str>,
    ) -> Result<GateDecision> {
        if let Some(key) = api_key_override {
            return match self.validator.validate(key).await {
                Ok(()) => Ok(GateDecision::Proceed { used_override: true }),
                Err(e) if e.is_auth_error() => {
                    tracing::info!(user_id, "override key rejected");
                    Ok(GateDecision::InvalidKey {
                        message: e.to_string(),
                    })
                }
                Err(e) => Err(Error::Ai(e)),
            };
        }

        let available = self.quota.available_ships(user_id).await?;
        if available <= 0 {
            tracing::info!(user_id, available, "quota exhausted");
            return Ok(GateDecision::PaymentRequired);
        }
        Ok(GateDecision::Proceed { used_override: false })
    }
}

/// In-memory quota store for tests and local runs.
#[derive(Default)]
pub struct FixedQuotaStore {
    ships: Mutex<HashMap<String, i64>>,
}

impl FixedQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: impl Into<String>, available: i64) {
        self.ships.lock().insert(user_id.into(), available);
    }
}

#[async_trait]
impl QuotaStore for FixedQuotaStore {
    async fn available_ships(&self, user_id: &str) -> Result<i64> {
        Ok(self.ships.lock().get(user_id).copied().unwrap_or(0))
    }
}
