use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::checkout::AddressInput;
use crate::entities::return_request;
use crate::entities::return_request::InspectionVerdict;
use crate::types::{PickupSlot, ReturnItemEntry};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReturnItemInput {
    pub order_item_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    pub condition: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RequestReturnInput {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "at least one item is required"))]
    #[validate(nested)]
    pub items: Vec<ReturnItemInput>,
    /// Defaults to the order's shipping address.
    #[validate(nested)]
    pub pickup_address: Option<AddressInput>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SchedulePickupInput {
    pub date: NaiveDate,
    #[validate(length(min = 1, max = 40))]
    pub window: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct InspectReturnInput {
    #[schema(value_type = String)]
    pub verdict: InspectionVerdict,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// Required for a `partial` verdict: the amount to refund.
    pub partial_amount: Option<rust_decimal::Decimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnResponse {
    pub id: Uuid,
    pub return_number: String,
    pub order_id: Uuid,
    pub status: String,
    pub items: Vec<ReturnItemEntry>,
    pub pickup_slot: Option<PickupSlot>,
    pub tracking_number: Option<String>,
    pub inspection_verdict: Option<String>,
    pub inspection_notes: Option<String>,
    pub refund_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<return_request::Model> for ReturnResponse {
    fn from(model: return_request::Model) -> Self {
        let items: Vec<ReturnItemEntry> =
            serde_json::from_value(model.items.clone()).unwrap_or_default();
        let pickup_slot = model
            .pickup_slot
            .as_ref()
            .and_then(|slot| serde_json::from_value(slot.clone()).ok());
        Self {
            id: model.id,
            return_number: model.return_number,
            order_id: model.order_id,
            status: model.status.as_str().to_string(),
            items,
            pickup_slot,
            tracking_number: model.tracking_number,
            inspection_verdict: model.inspection_verdict.map(|verdict| {
                match verdict {
                    InspectionVerdict::Accepted => "accepted",
                    InspectionVerdict::Rejected => "rejected",
                    InspectionVerdict::Partial => "partial",
                }
                .to_string()
            }),
            inspection_notes: model.inspection_notes,
            refund_id: model.refund_id,
            created_at: model.created_at,
        }
    }
}
