//! Payment collaborator: funding-source balance queries and transfer
//! execution, plus the platform fee arithmetic.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Platform fee rate applied at settlement: 2.5%.
pub const PLATFORM_FEE_RATE: &str = "0.025";

/// Fee owed on a payout amount, rounded to 2 decimal places.
pub fn platform_fee(amount: &BigDecimal) -> BigDecimal {
    let rate = BigDecimal::from_str(PLATFORM_FEE_RATE).expect("fee rate is a valid decimal");
    (amount * rate).round(2)
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider rejected the call with status {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("circuit breaker open: {0}")]
    CircuitOpen(String),
    #[error("malformed provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    pub source_account: String,
    pub destination: String,
    pub amount: BigDecimal,
    pub currency: String,
    /// Payout id, passed to the provider for reconciliation.
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTransfer {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    available: String,
    #[allow(dead_code)]
    currency: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Available balance for the account in the given currency. Does not
    /// account for our own in-flight reservations; the store does.
    async fn available_balance(
        &self,
        account: &str,
        currency: &str,
    ) -> Result<BigDecimal, PaymentError>;

    async fn execute_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<ProviderTransfer, PaymentError>;
}

/// HTTP client for the payment provider. Calls run behind a circuit breaker
/// so a flapping provider fails fast instead of queueing claims.
pub struct HttpPaymentClient {
    client: Client,
    base_url: String,
    api_key: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HttpPaymentClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(30), Duration::from_secs(60));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentClient {
    async fn available_balance(
        &self,
        account: &str,
        currency: &str,
    ) -> Result<BigDecimal, PaymentError> {
        let url = format!("{}/accounts/{}/balance", self.base_url, account);
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let currency = currency.to_string();

        let result = self
            .circuit_breaker
            .call(async move {
                let res = client
                    .get(&url)
                    .query(&[("currency", currency.as_str())])
                    .bearer_auth(&api_key)
                    .send()
                    .await?;

                let status = res.status();
                if !status.is_success() {
                    let message = res.text().await.unwrap_or_default();
                    return Err(PaymentError::Provider {
                        status: status.as_u16(),
                        message,
                    });
                }

                let body = res.json::<BalanceResponse>().await?;
                BigDecimal::from_str(&body.available).map_err(|_| {
                    PaymentError::InvalidResponse(format!(
                        "balance is not a decimal: {}",
                        body.available
                    ))
                })
            })
            .await;

        match result {
            Ok(balance) => Ok(balance),
            Err(FailsafeError::Rejected) => Err(PaymentError::CircuitOpen(
                "payment provider circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    async fn execute_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<ProviderTransfer, PaymentError> {
        let url = format!("{}/transfers", self.base_url);
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let payload = serde_json::json!({
            "source_account": request.source_account,
            "destination": request.destination,
            "amount": request.amount.to_string(),
            "currency": request.currency,
            "reference": request.reference,
        });

        let result = self
            .circuit_breaker
            .call(async move {
                let res = client
                    .post(&url)
                    .bearer_auth(&api_key)
                    .json(&payload)
                    .send()
                    .await?;

                let status = res.status();
                if !status.is_success() {
                    let message = res.text().await.unwrap_or_default();
                    return Err(PaymentError::Provider {
                        status: status.as_u16(),
                        message,
                    });
                }

                Ok(res.json::<ProviderTransfer>().await?)
            })
            .await;

        match result {
            Ok(transfer) => Ok(transfer),
            Err(FailsafeError::Rejected) => Err(PaymentError::CircuitOpen(
                "payment provider circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}
