use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::any::Any;

use kirana_core::events::{EventEnvelope, EventTransport, ReliabilityLevel};
use kirana_core::{Error, Result};

use crate::entity;
use crate::entity::OutboxStatus;

/// Event transport that parks envelopes in the `outbox_events` table.
/// Enqueueing through the caller's transaction is what gives the outbox its
/// guarantee; the plain `publish` path exists for callers that have no
/// transaction open and accept enqueue-or-error semantics.
#[derive(Clone, Debug)]
pub struct OutboxTransport {
    db: DatabaseConnection,
}

impl OutboxTransport {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Park an envelope on whatever connection the caller is mutating
    /// state through, usually an open transaction.
    pub async fn enqueue<C>(&self, conn: &C, envelope: EventEnvelope) -> Result<()>
    where
        C: ConnectionTrait,
    {
        let row = entity::ActiveModel {
            id: Set(envelope.id),
            event_type: Set(envelope.event_type.clone()),
            payload: Set(serde_json::to_value(&envelope)?),
            status: Set(OutboxStatus::Pending),
            attempts: Set(0),
            last_error: Set(None),
            next_attempt_at: Set(None),
            locked_by: Set(None),
            locked_at: Set(None),
            created_at: Set(Utc::now()),
            dispatched_at: Set(None),
        };
        entity::Entity::insert(row).exec_without_returning(conn).await?;
        Ok(())
    }
}

#[async_trait]
impl EventTransport for OutboxTransport {
    async fn publish(&self, envelope: EventEnvelope) -> Result<()> {
        self.enqueue(&self.db, envelope).await
    }

    async fn acknowledge(&self, event_id: uuid::Uuid) -> Result<()> {
        let updated = entity::Entity::update_many()
            .col_expr(entity::Column::Status, Expr::value(OutboxStatus::Dispatched))
            .col_expr(entity::Column::DispatchedAt, Expr::value(Some(Utc::now())))
            .col_expr(entity::Column::LockedBy, Expr::value(Option::<String>::None))
            .col_expr(entity::Column::LockedAt, Expr::value(Option::<chrono::DateTime<Utc>>::None))
            .col_expr(entity::Column::LastError, Expr::value(Option::<String>::None))
            .filter(entity::Column::Id.eq(event_id))
            .exec(&self.db)
            .await?;
        if updated.rows_affected == 0 {
            return Err(Error::NotFound(format!("outbox_event {event_id}")));
        }
        Ok(())
    }

    fn reliability_level(&self) -> ReliabilityLevel {
        ReliabilityLevel::Outbox
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
