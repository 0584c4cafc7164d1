//! Faucet HTTP API client
//!
//! One round trip per call and no retries; retry policy belongs to the
//! claim engine.

use crate::error::{FaucetError, FaucetResult};
use crate::wallet::is_valid_claim_amount;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// A CAPTCHA challenge issued by the faucet
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    pub challenge_id: String,
    /// Raw challenge body (SVG markup for the reference faucet)
    pub payload: String,
}

/// Remote eligibility and balance, shared across all callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaucetStatus {
    pub claimable_now: bool,
    pub hours_until_next: f64,
    pub balance: f64,
    pub known_addresses: Vec<String>,
}

/// Outcome of a claim submission that reached the faucet.
///
/// `accepted == false` is a business answer (wrong CAPTCHA, cooldown,
/// rate limit), not a transport failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimSubmission {
    pub accepted: bool,
    pub amount: Option<f64>,
    pub tx_ref: Option<String>,
    pub reason: Option<String>,
}

impl ClaimSubmission {
    pub fn accepted(amount: f64, tx_ref: impl Into<String>) -> Self {
        Self {
            accepted: true,
            amount: Some(amount),
            tx_ref: Some(tx_ref.into()),
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            amount: None,
            tx_ref: None,
            reason: Some(reason.into()),
        }
    }
}

/// Request surface of a rate-limited, CAPTCHA-gated faucet
#[async_trait]
pub trait FaucetApi: Send + Sync {
    async fn fetch_challenge(&self) -> FaucetResult<Challenge>;

    async fn fetch_status(&self) -> FaucetResult<FaucetStatus>;

    async fn submit_claim(
        &self,
        address: &str,
        challenge_id: &str,
        answer: &str,
    ) -> FaucetResult<ClaimSubmission>;
}

// Wire formats

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptchaResponse {
    #[serde(deserialize_with = "flexible_string")]
    captcha_id: String,
    captcha: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    #[serde(default, deserialize_with = "flexible_f64")]
    balance: f64,
    #[serde(default)]
    can_claim: bool,
    #[serde(default, deserialize_with = "flexible_f64")]
    hours_until_next_claim: f64,
    #[serde(default)]
    faucet_addresses: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRequest<'a> {
    address: &'a str,
    captcha_id: &'a str,
    captcha: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    amount: Option<f64>,
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ClaimResponse {
    fn reason(self, status: StatusCode) -> String {
        self.message
            .or(self.error)
            .unwrap_or_else(|| status.to_string())
    }
}

fn value_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts `1.5` or `"1.5"`.
fn flexible_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(0.0),
        other => value_to_f64(&other)
            .ok_or_else(|| serde::de::Error::custom(format!("expected number, got {}", other))),
    }
}

fn flexible_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value))
}

fn flexible_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string id, got {}", other))),
    }
}

/// reqwest-backed client for the faucet HTTP API
pub struct HttpFaucetClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpFaucetClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> FaucetResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("faucet-claimer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

async fn decode_success<T: DeserializeOwned>(response: reqwest::Response) -> FaucetResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(FaucetError::Network(format!("Unexpected status: {}", status)));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| FaucetError::Network(format!("Invalid response: {}", e)))
}

#[async_trait]
impl FaucetApi for HttpFaucetClient {
    async fn fetch_challenge(&self) -> FaucetResult<Challenge> {
        let response = self.client.get(self.url("captcha")).send().await?;
        let body: CaptchaResponse = decode_success(response).await?;

        debug!("Fetched captcha {}", body.captcha_id);
        Ok(Challenge {
            challenge_id: body.captcha_id,
            payload: body.captcha,
        })
    }

    async fn fetch_status(&self) -> FaucetResult<FaucetStatus> {
        let response = self.client.get(self.url("info")).send().await?;
        let body: InfoResponse = decode_success(response).await?;

        Ok(FaucetStatus {
            claimable_now: body.can_claim,
            hours_until_next: body.hours_until_next_claim,
            balance: body.balance,
            known_addresses: body.faucet_addresses,
        })
    }

    async fn submit_claim(
        &self,
        address: &str,
        challenge_id: &str,
        answer: &str,
    ) -> FaucetResult<ClaimSubmission> {
        let request = ClaimRequest {
            address,
            captcha_id: challenge_id,
            captcha: answer,
        };

        let response = self.client.post(self.url("claim")).json(&request).send().await?;
        let status = response.status();

        if status.is_server_error() {
            return Err(FaucetError::Network(format!("Unexpected status: {}", status)));
        }

        let text = response.text().await?;
        let parsed = serde_json::from_str::<ClaimResponse>(&text);

        if status.is_client_error() {
            // 4xx carries the faucet's verdict: wrong captcha, cooldown, rate limit
            let reason = match parsed {
                Ok(body) => body.reason(status),
                Err(_) => status.to_string(),
            };
            return Ok(ClaimSubmission::rejected(reason));
        }

        let body = parsed.map_err(|e| FaucetError::Network(format!("Invalid response: {}", e)))?;
        if body.success {
            if let Some(amount) = body.amount.filter(|a| !is_valid_claim_amount(*a)) {
                return Err(FaucetError::Network(format!(
                    "Invalid response: claim amount {}",
                    amount
                )));
            }
            Ok(ClaimSubmission {
                accepted: true,
                amount: body.amount,
                tx_ref: body.tx_hash,
                reason: None,
            })
        } else {
            Ok(ClaimSubmission::rejected(body.reason(status)))
        }
    }
}
