//! Quota store backed by the user profile API

use async_trait::async_trait;
use serde::Deserialize;

use ship_agent::QuotaStore;

/// Profile record returned by the user API. Only the quota field matters here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    #[serde(default)]
    available_ships: i64,
}

/// Reads quota over HTTP from the user service.
///
/// Unknown users read as zero quota; the gate turns that into a payment
/// prompt rather than an error.
pub struct HttpQuotaStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQuotaStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl QuotaStore for HttpQuotaStore {
    async fn available_ships(&self, user_id: &str) -> ship_agent::Result<i64> {
        let url = format!("{}/api/users/{}/profile", self.base_url, user_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ship_agent::Error::Quota(format!("profile lookup failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            return Err(ship_agent::Error::Quota(format!(
                "profile lookup returned {}",
                response.status()
            )));
        }

        let profile: Profile = response
            .json()
            .await
            .map_err(|e| ship_agent::Error::Quota(format!("invalid profile response: {}", e)))?;
        Ok(profile.available_ships)
    }
}

/// Quota store used when no user API is configured. Every request proceeds.
pub struct UnlimitedQuota;

#[async_trait]
impl QuotaStore for UnlimitedQuota {
    async fn available_ships(&self, _user_id: &str) -> ship_agent::Result<i64> {
        Ok(i64::MAX)
    }
}
