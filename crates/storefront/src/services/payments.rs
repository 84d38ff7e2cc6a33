//! Payment settlement.
//!
//! Only a stub provider exists. It decides the outcome from the amount so
//! every branch can be exercised from the storefront:
//!
//! | amount              | status    |
//! |---------------------|-----------|
//! | cents part is `.13` | `failed`  |
//! | over 100            | `pending` |
//! | anything else       | `success` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use thiserror::Error;

use fastspot_core::{CurrencyCode, PaymentStatus};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("amount must not be negative: {0}")]
    InvalidAmount(Decimal),

    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

/// Outcome reported by a provider. A `failed` status is still an `Ok`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementResult {
    pub transaction_id: String,
    pub status: PaymentStatus,
    pub message: String,
    pub processed_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Attempt to settle `amount`.
    ///
    /// `Err` means the provider could not be asked at all; declined payments
    /// come back as `Ok` with [`PaymentStatus::Failed`].
    async fn settle(
        &self,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Result<SettlementResult, PaymentError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StubPaymentProvider;

const PENDING_THRESHOLD: Decimal = Decimal::ONE_HUNDRED;
const DECLINED_CENTS: i64 = 13;

impl StubPaymentProvider {
    fn outcome(amount: Decimal) -> (PaymentStatus, &'static str) {
        let cents = (amount * Decimal::ONE_HUNDRED).trunc() % Decimal::ONE_HUNDRED;
        if cents == Decimal::from(DECLINED_CENTS) {
            (PaymentStatus::Failed, "Payment declined")
        } else if amount > PENDING_THRESHOLD {
            (PaymentStatus::Pending, "Payment is being processed")
        } else {
            (PaymentStatus::Success, "Payment processed successfully")
        }
    }
}

#[async_trait]
impl PaymentProvider for StubPaymentProvider {
    #[tracing::instrument(skip_all, fields(%amount, %currency))]
    async fn settle(
        &self,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Result<SettlementResult, PaymentError> {
        if amount.is_sign_negative() {
            return Err(PaymentError::InvalidAmount(amount));
        }

        let now = Utc::now();
        let suffix: u16 = rand::rng().random();
        let (status, message) = Self::outcome(amount);
        tracing::debug!(%status, "stub settlement");

        Ok(SettlementResult {
            transaction_id: format!("STUB-{}-{suffix:04x}", now.timestamp()),
            status,
            message: message.to_string(),
            processed_at: now,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn settle(cents: i64) -> SettlementResult {
        StubPaymentProvider
            .settle(Decimal::new(cents, 2), CurrencyCode::USD)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_small_amount_succeeds() {
        let result = settle(1800).await;
        assert_eq!(result.status, PaymentStatus::Success);
        assert!(result.transaction_id.starts_with("STUB-"));
    }

    #[tokio::test]
    async fn test_large_amount_is_pending() {
        assert_eq!(settle(10001).await.status, PaymentStatus::Pending);
        assert_eq!(settle(10000).await.status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn test_thirteen_cents_is_declined_even_when_large() {
        assert_eq!(settle(913).await.status, PaymentStatus::Failed);
        assert_eq!(settle(15013).await.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_negative_amount_is_an_error() {
        let err = StubPaymentProvider
            .settle(Decimal::new(-1, 0), CurrencyCode::USD)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidAmount(_)));
    }
}
