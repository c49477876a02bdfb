use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Waiting for delivery (possibly with a backoff deadline).
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "dispatched")]
    Dispatched,
    /// Delivery attempts exhausted; parked for manual inspection.
    #[sea_orm(string_value = "dead")]
    Dead,
}

/// One enqueued domain event. `payload` holds the full serialized
/// [`kirana_core::events::EventEnvelope`] (including its schema version);
/// `event_type` is denormalized for filtering. `locked_by`/`locked_at`
/// form a delivery lease: a row is only worked on by the relay holding the
/// lease, and stale leases are reclaimable after a crash.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "outbox_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub event_type: String,
    pub payload: Json,
    pub status: OutboxStatus,
    /// Delivery attempts made so far.
    pub attempts: i32,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Pending, past its backoff deadline, and not leased to a relay.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == OutboxStatus::Pending
            && self.locked_at.is_none()
            && self.next_attempt_at.map(|at| at <= now).unwrap_or(true)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row(status: OutboxStatus) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            event_type: "order.created".to_string(),
            payload: serde_json::json!({}),
            status,
            attempts: 0,
            last_error: None,
            next_attempt_at: None,
            locked_by: None,
            locked_at: None,
            created_at: now,
            dispatched_at: None,
        }
    }

    #[test]
    fn pending_unleased_rows_are_due() {
        let now = Utc::now();
        assert!(row(OutboxStatus::Pending).is_due(now));
        assert!(!row(OutboxStatus::Dispatched).is_due(now));
        assert!(!row(OutboxStatus::Dead).is_due(now));
    }

    #[test]
    fn backoff_deadline_and_lease_defer_a_row() {
        let now = Utc::now();
        let mut backed_off = row(OutboxStatus::Pending);
        backed_off.next_attempt_at = Some(now + Duration::seconds(30));
        assert!(!backed_off.is_due(now));

        let mut leased = row(OutboxStatus::Pending);
        leased.locked_by = Some("relay-a".to_string());
        leased.locked_at = Some(now);
        assert!(!leased.is_due(now));
    }
}
