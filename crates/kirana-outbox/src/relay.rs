use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde_json::from_value;
use uuid::Uuid;

use kirana_core::events::{EventEnvelope, EventTransport};
use kirana_core::Result;

use crate::entity;
use crate::entity::OutboxStatus;

/// Delivery policy. The application wires this from its settings; there is
/// deliberately no default so tuning always has one source of truth.
#[derive(Clone, Debug)]
pub struct RelayTuning {
    pub batch_size: u64,
    /// Attempts before a row is parked as dead.
    pub max_attempts: i32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// How long a delivery lease may be held before another relay (or a
    /// restarted one) may take the row back.
    pub lock_lease: Duration,
}

impl RelayTuning {
    fn backoff_after(&self, attempts: i32) -> chrono::Duration {
        // base, 2·base, 4·base, ... capped. Saturate rather than overflow
        // on absurd attempt counts.
        let doublings = attempts.saturating_sub(1).clamp(0, 20) as u32;
        let backoff = self
            .backoff_base
            .saturating_mul(1u32 << doublings)
            .min(self.backoff_cap);
        chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::seconds(60))
    }
}

/// Drains `outbox_events` to the downstream transport.
///
/// Rows are taken one at a time under a compare-and-set lease: losing the
/// race simply means another relay delivers that row. Delivery failures
/// re-queue the row with exponential backoff until the attempt budget is
/// spent, after which it is parked as dead for an operator to look at.
#[derive(Clone)]
pub struct OutboxRelay {
    db: DatabaseConnection,
    target: Arc<dyn EventTransport>,
    relay_id: String,
    tuning: RelayTuning,
}

impl std::fmt::Debug for OutboxRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxRelay")
            .field("relay_id", &self.relay_id)
            .field("tuning", &self.tuning)
            .finish_non_exhaustive()
    }
}

impl OutboxRelay {
    pub fn new(db: DatabaseConnection, target: Arc<dyn EventTransport>, tuning: RelayTuning) -> Self {
        Self {
            db,
            target,
            relay_id: format!("relay-{}", Uuid::new_v4()),
            tuning,
        }
    }

    /// One bounded pass: free any stale leases, then claim and deliver due
    /// rows. Returns how many rows were delivered or re-queued, so callers
    /// can idle when nothing was there.
    pub async fn drain_once(&self) -> Result<usize> {
        let now = Utc::now();
        self.reclaim_stale_leases(now).await?;

        let due = entity::Entity::find()
            .filter(entity::Column::Status.eq(OutboxStatus::Pending))
            .filter(entity::Column::LockedAt.is_null())
            .filter(
                Condition::any()
                    .add(entity::Column::NextAttemptAt.is_null())
                    .add(entity::Column::NextAttemptAt.lte(now)),
            )
            .order_by_asc(entity::Column::CreatedAt)
            .limit(self.tuning.batch_size)
            .all(&self.db)
            .await?;

        let mut worked = 0;
        for row in due {
            if self.lease(row.id, now).await? {
                self.deliver(row).await?;
                worked += 1;
            }
            // Lost lease: a sibling relay has the row.
        }
        Ok(worked)
    }

    /// Take the per-row lease. The filter on `locked_at IS NULL` is the
    /// CAS: zero rows affected means someone else got there first.
    async fn lease(&self, event_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let claimed = entity::Entity::update_many()
            .col_expr(entity::Column::LockedBy, Expr::value(Some(self.relay_id.clone())))
            .col_expr(entity::Column::LockedAt, Expr::value(Some(now)))
            .filter(entity::Column::Id.eq(event_id))
            .filter(entity::Column::Status.eq(OutboxStatus::Pending))
            .filter(entity::Column::LockedAt.is_null())
            .exec(&self.db)
            .await?;
        Ok(claimed.rows_affected == 1)
    }

    async fn deliver(&self, row: entity::Model) -> Result<()> {
        let event_id = row.id;
        let attempts = row.attempts + 1;
        let envelope: EventEnvelope = from_value(row.payload.clone())?;

        match self.target.publish(envelope).await {
            Ok(()) => {
                entity::Entity::update_many()
                    .col_expr(entity::Column::Status, Expr::value(OutboxStatus::Dispatched))
                    .col_expr(entity::Column::Attempts, Expr::value(attempts))
                    .col_expr(entity::Column::DispatchedAt, Expr::value(Some(Utc::now())))
                    .col_expr(entity::Column::LockedBy, Expr::value(Option::<String>::None))
                    .col_expr(entity::Column::LockedAt, Expr::value(Option::<DateTime<Utc>>::None))
                    .col_expr(entity::Column::LastError, Expr::value(Option::<String>::None))
                    .col_expr(entity::Column::NextAttemptAt, Expr::value(Option::<DateTime<Utc>>::None))
                    .filter(entity::Column::Id.eq(event_id))
                    .exec(&self.db)
                    .await?;
                tracing::debug!(event_id = %event_id, event_type = %row.event_type, "outbox row delivered");
                Ok(())
            }
            Err(error) => self.requeue_or_park(&row, attempts, error.to_string()).await,
        }
    }

    async fn requeue_or_park(
        &self,
        row: &entity::Model,
        attempts: i32,
        error: String,
    ) -> Result<()> {
        let parked = attempts >= self.tuning.max_attempts;
        let (status, next_attempt_at) = if parked {
            (OutboxStatus::Dead, None)
        } else {
            (
                OutboxStatus::Pending,
                Some(Utc::now() + self.tuning.backoff_after(attempts)),
            )
        };

        entity::Entity::update_many()
            .col_expr(entity::Column::Status, Expr::value(status))
            .col_expr(entity::Column::Attempts, Expr::value(attempts))
            .col_expr(entity::Column::LastError, Expr::value(Some(error.clone())))
            .col_expr(entity::Column::NextAttemptAt, Expr::value(next_attempt_at))
            .col_expr(entity::Column::LockedBy, Expr::value(Option::<String>::None))
            .col_expr(entity::Column::LockedAt, Expr::value(Option::<DateTime<Utc>>::None))
            .filter(entity::Column::Id.eq(row.id))
            .exec(&self.db)
            .await?;

        if parked {
            tracing::error!(
                event_id = %row.id,
                event_type = %row.event_type,
                attempts,
                %error,
                "outbox row parked as dead after exhausting attempts"
            );
        } else {
            tracing::warn!(
                event_id = %row.id,
                attempts,
                next_attempt_at = ?next_attempt_at,
                "outbox delivery failed, backing off"
            );
        }
        Ok(())
    }

    /// A relay that died mid-delivery leaves its lease behind; once the
    /// lease is older than the configured window, hand the row back.
    async fn reclaim_stale_leases(&self, now: DateTime<Utc>) -> Result<()> {
        let lease = chrono::Duration::from_std(self.tuning.lock_lease)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let freed = entity::Entity::update_many()
            .col_expr(entity::Column::LockedBy, Expr::value(Option::<String>::None))
            .col_expr(entity::Column::LockedAt, Expr::value(Option::<DateTime<Utc>>::None))
            .filter(entity::Column::Status.eq(OutboxStatus::Pending))
            .filter(entity::Column::LockedAt.lt(now - lease))
            .exec(&self.db)
            .await?;
        if freed.rows_affected > 0 {
            tracing::warn!(count = freed.rows_affected, "reclaimed stale outbox leases");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> RelayTuning {
        RelayTuning {
            batch_size: 100,
            max_attempts: 5,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(60),
            lock_lease: Duration::from_secs(300),
        }
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let tuning = tuning();
        assert_eq!(tuning.backoff_after(1), chrono::Duration::seconds(1));
        assert_eq!(tuning.backoff_after(2), chrono::Duration::seconds(2));
        assert_eq!(tuning.backoff_after(3), chrono::Duration::seconds(4));
        assert_eq!(tuning.backoff_after(10), chrono::Duration::seconds(60));
    }

    #[test]
    fn backoff_survives_absurd_attempt_counts() {
        let tuning = tuning();
        assert_eq!(tuning.backoff_after(i32::MAX), chrono::Duration::seconds(60));
    }
}
