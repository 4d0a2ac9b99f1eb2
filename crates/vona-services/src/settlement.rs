//! Webhook-driven call cost settlement
//!
//! Turns a provider status delivery into a call record, a balance deduction
//! and a ledger entry, atomically and idempotently. The provider redelivers
//! webhooks at will, so the pipeline must charge exactly once per call no
//! matter how many times or in what order deliveries arrive.
//!
//! Money only moves inside one database transaction holding the account row
//! lock; the idempotency guard reads the stored call record under that same
//! lock. Anything that goes wrong degrades to an unbilled call record and an
//! acknowledged webhook, never a provider-visible error.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use vona_core::models::{CallRecord, CallStatus, ProviderStatus, TransactionRecord};
use vona_core::traits::{CallRepository, PricingRepository};
use vona_core::{AppError, AppResult};
use vona_db::repositories::PgCallRepository;

use crate::constants::SETTLEMENT_MAX_RETRIES;
use crate::pricing::PricingService;

/// A provider status delivery, decoded from the webhook form body
#[derive(Debug, Clone)]
pub struct CallStatusEvent {
    /// Provider call SID (the idempotency key)
    pub call_sid: String,

    /// Account the call belongs to (UserId from the callback query string)
    pub account_id: String,

    /// Raw provider status
    pub provider_status: ProviderStatus,

    /// Call duration in seconds as reported by the provider
    pub duration_secs: i32,

    /// Dialed number
    pub to_number: String,

    /// Originating identity, when the provider sends one
    pub from_number: Option<String>,
}

/// How a delivery was settled
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// Money moved: the call was costed and the deduction applied
    Billed {
        cost: Decimal,
        deduction: Decimal,
        balance_after: Decimal,
    },
    /// The stored record already reached a terminal status; nothing charged
    Duplicate,
    /// Call recorded without a charge (unanswered, unpriced, denylisted,
    /// zero duration, or a non-terminal status)
    Recorded,
    /// Settlement failed; a best-effort unbilled record was written
    Fallback,
}

/// Settlement pipeline
pub struct SettlementService<P: PricingRepository> {
    pool: PgPool,
    calls: PgCallRepository,
    pricing: Arc<PricingService<P>>,
}

impl<P: PricingRepository> SettlementService<P> {
    /// Create a new settlement service
    pub fn new(pool: PgPool, pricing: Arc<PricingService<P>>) -> Self {
        let calls = PgCallRepository::new(pool.clone());
        Self {
            pool,
            calls,
            pricing,
        }
    }

    /// Settle one status delivery
    ///
    /// Never returns an error: every internal failure resolves to a
    /// degraded outcome so the webhook handler can always acknowledge.
    #[instrument(skip(self, event), fields(call_sid = %event.call_sid, account_id = %event.account_id))]
    pub async fn process(&self, event: &CallStatusEvent) -> SettlementOutcome {
        let status = event.provider_status.to_call_status();

        let cost = if status == CallStatus::Answered && event.duration_secs > 0 {
            self.cost_for_event(event).await
        } else {
            Decimal::ZERO
        };

        if cost.is_zero() {
            return self.record_unbilled(event, status).await;
        }

        // Money moves: retry transient conflicts, then degrade.
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.bill(event, status, cost).await {
                Ok(outcome) => {
                    info!(attempt, ?outcome, "Settlement complete");
                    return outcome;
                }
                Err(e) if e.is_retryable() && attempt < SETTLEMENT_MAX_RETRIES => {
                    warn!(attempt, error = %e, "Settlement conflict, retrying");
                }
                Err(e) => {
                    error!(attempt, error = %e, "Settlement failed, writing unbilled record");
                    self.write_fallback(event, status).await;
                    return SettlementOutcome::Fallback;
                }
            }
        }
    }

    /// Price the call; any pricing failure bills zero and records the call
    async fn cost_for_event(&self, event: &CallStatusEvent) -> Decimal {
        let rate = match self.pricing.resolve_rate(&event.to_number).await {
            Ok(rate) => rate,
            Err(e) => {
                warn!(to = %event.to_number, error = %e, "No pricing for destination, billing zero");
                return Decimal::ZERO;
            }
        };

        if rate.is_unsupported {
            warn!(country = %rate.country_code, "Call to denylisted destination, billing zero");
            return Decimal::ZERO;
        }

        match rate.cost_for_duration(event.duration_secs) {
            Ok(cost) => cost,
            Err(e) => {
                warn!(duration = event.duration_secs, error = %e, "Cost calculation failed, billing zero");
                Decimal::ZERO
            }
        }
    }

    /// Zero-cost path: one atomic upsert, no account lock needed
    async fn record_unbilled(
        &self,
        event: &CallStatusEvent,
        status: CallStatus,
    ) -> SettlementOutcome {
        // Terminal zero-cost statuses pin the cost at zero; intermediate
        // deliveries leave it unset for a later settlement to fill.
        let cost = status.is_terminal().then_some(Decimal::ZERO);
        let record = Self::record_from_event(event, status, cost);

        match self.calls.merge_status(&record).await {
            Ok(()) => {
                debug!(status = %status, "Call recorded without charge");
                SettlementOutcome::Recorded
            }
            Err(e) => {
                error!(error = %e, "Failed to record call");
                SettlementOutcome::Fallback
            }
        }
    }

    /// The atomic settlement transaction
    async fn bill(
        &self,
        event: &CallStatusEvent,
        status: CallStatus,
        cost: Decimal,
    ) -> AppResult<SettlementOutcome> {
        let mut tx = self.pool.begin().await.map_err(map_tx_error)?;

        // Account row lock serializes all settlement for this account.
        let balance: Decimal = sqlx::query_scalar(
            "SELECT balance FROM accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(&event.account_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_tx_error)?
        .ok_or_else(|| AppError::AccountNotFound(event.account_id.clone()))?;

        // Idempotency guard, under the same lock: a stored terminal status
        // plus an incoming terminal one is a redelivery.
        let stored_status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM call_records WHERE call_sid = $1 FOR UPDATE",
        )
        .bind(&event.call_sid)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_tx_error)?;

        let stored_terminal = stored_status
            .as_deref()
            .and_then(CallStatus::from_str)
            .map(|s| s.is_terminal())
            .unwrap_or(false);

        if stored_terminal && status.is_terminal() {
            let record = Self::record_from_event(event, status, None);
            Self::merge_in_tx(&mut tx, &record).await?;
            tx.commit().await.map_err(map_tx_error)?;
            info!("Duplicate terminal delivery, no charge");
            return Ok(SettlementOutcome::Duplicate);
        }

        let deduction = cost.min(balance);
        if deduction < cost {
            warn!(
                %cost, %balance,
                "Insufficient funds, charging remaining balance"
            );
        }

        // The stored cost is what was actually collected.
        let record = Self::record_from_event(event, status, Some(deduction));
        Self::merge_in_tx(&mut tx, &record).await?;

        let balance_after = if deduction > Decimal::ZERO {
            let balance_after: Decimal = sqlx::query_scalar(
                r#"
                UPDATE accounts
                SET balance = balance - $2, updated_at = NOW()
                WHERE id = $1
                RETURNING balance
                "#,
            )
            .bind(&event.account_id)
            .bind(deduction)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_tx_error)?;

            let entry = TransactionRecord::call_charge(
                event.account_id.clone(),
                deduction,
                balance_after,
                event.call_sid.clone(),
            );
            Self::append_ledger_in_tx(&mut tx, &entry).await?;

            balance_after
        } else {
            balance
        };

        tx.commit().await.map_err(map_tx_error)?;

        Ok(SettlementOutcome::Billed {
            cost,
            deduction,
            balance_after,
        })
    }

    /// Best-effort unbilled record after a failed settlement
    async fn write_fallback(&self, event: &CallStatusEvent, status: CallStatus) {
        let record = Self::record_from_event(event, status, Some(Decimal::ZERO));
        if let Err(e) = self.calls.merge_status(&record).await {
            error!(error = %e, "Fallback call record write failed");
        }
    }

    fn record_from_event(
        event: &CallStatusEvent,
        status: CallStatus,
        cost: Option<Decimal>,
    ) -> CallRecord {
        CallRecord {
            call_sid: event.call_sid.clone(),
            account_id: event.account_id.clone(),
            phone_number: event.to_number.clone(),
            provider_status: event.provider_status.to_string(),
            status,
            duration_secs: event.duration_secs.max(0),
            cost,
            ..Default::default()
        }
    }

    /// Same merge upsert the repository uses, bound to the open transaction
    async fn merge_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        record: &CallRecord,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO call_records (
                call_sid, account_id, phone_number, direction,
                provider_status, status, duration_secs, cost
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (call_sid) DO UPDATE
            SET provider_status = EXCLUDED.provider_status,
                status = EXCLUDED.status,
                duration_secs = GREATEST(call_records.duration_secs, EXCLUDED.duration_secs),
                cost = COALESCE(call_records.cost, EXCLUDED.cost),
                updated_at = NOW()
            WHERE call_records.status = 'unknown' OR EXCLUDED.status <> 'unknown'
            "#,
        )
        .bind(&record.call_sid)
        .bind(&record.account_id)
        .bind(&record.phone_number)
        .bind(record.direction.to_string())
        .bind(&record.provider_status)
        .bind(record.status.to_string())
        .bind(record.duration_secs)
        .bind(record.cost)
        .execute(&mut **tx)
        .await
        .map_err(map_tx_error)?;

        Ok(())
    }

    async fn append_ledger_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        entry: &TransactionRecord,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                account_id, transaction_type, amount, currency,
                status, source, call_sid, external_ref, balance_after
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&entry.account_id)
        .bind(entry.transaction_type.to_string())
        .bind(entry.amount)
        .bind(&entry.currency)
        .bind(&entry.status)
        .bind(&entry.source)
        .bind(&entry.call_sid)
        .bind(&entry.external_ref)
        .bind(entry.balance_after)
        .execute(&mut **tx)
        .await
        .map_err(map_tx_error)?;

        Ok(())
    }
}

/// Serialization failures and deadlocks are worth a bounded retry
fn is_conflict_code(code: &str) -> bool {
    matches!(code, "40001" | "40P01")
}

fn map_tx_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if let Some(code) = db_err.code() {
            if is_conflict_code(&code) {
                return AppError::TransactionConflict(db_err.to_string());
            }
        }
    }
    AppError::Database(format!("Settlement transaction failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(status: &str, duration: i32) -> CallStatusEvent {
        CallStatusEvent {
            call_sid: "CA123".to_string(),
            account_id: "uid-1".to_string(),
            provider_status: ProviderStatus::parse(status),
            duration_secs: duration,
            to_number: "+12125551234".to_string(),
            from_number: Some("client:web".to_string()),
        }
    }

    #[test]
    fn test_conflict_codes() {
        assert!(is_conflict_code("40001"));
        assert!(is_conflict_code("40P01"));
        assert!(!is_conflict_code("23505"));
        assert!(!is_conflict_code("40002"));
    }

    #[test]
    fn test_record_from_event_clamps_negative_duration() {
        let mut e = event("completed", -5);
        e.duration_secs = -5;

        let record = SettlementService::<
            vona_db::repositories::PgPricingRepository,
        >::record_from_event(&e, CallStatus::Answered, Some(dec!(0.45)));

        assert_eq!(record.duration_secs, 0);
        assert_eq!(record.cost, Some(dec!(0.45)));
        assert_eq!(record.call_sid, "CA123");
        assert_eq!(record.phone_number, "+12125551234");
    }

    #[test]
    fn test_record_from_event_keeps_raw_provider_status() {
        let e = event("ringing", 0);

        let record = SettlementService::<
            vona_db::repositories::PgPricingRepository,
        >::record_from_event(&e, CallStatus::Unknown, None);

        assert_eq!(record.provider_status, "ringing");
        assert_eq!(record.status, CallStatus::Unknown);
        assert_eq!(record.cost, None);
    }
}
