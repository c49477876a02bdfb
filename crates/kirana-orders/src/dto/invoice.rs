use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::invoice;
use crate::types::{TaxLine, TotalsSnapshot};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub order_id: Uuid,
    pub tax_lines: Vec<TaxLine>,
    pub totals: Option<TotalsSnapshot>,
    pub generated_by: String,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

impl From<invoice::Model> for InvoiceResponse {
    fn from(model: invoice::Model) -> Self {
        let tax_lines: Vec<TaxLine> =
            serde_json::from_value(model.tax_lines.clone()).unwrap_or_default();
        let totals = serde_json::from_value(model.totals.clone()).ok();
        Self {
            id: model.id,
            invoice_number: model.invoice_number,
            order_id: model.order_id,
            tax_lines,
            totals,
            generated_by: model.generated_by,
            storage_key: model.storage_key,
            created_at: model.created_at,
        }
    }
}
