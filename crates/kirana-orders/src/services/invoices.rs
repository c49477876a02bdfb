//! Invoice generation.
//!
//! An invoice is a pure function of the order and its items: line table
//! with HSN codes, tax breakdown grouped by HSN, totals. The renderer
//! collaborator turns the document into a PDF and hands back a storage
//! pointer. Regeneration replaces the PDF but never the number.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use kirana_core::events::DomainEvent;
use kirana_core::money::round_money;
use kirana_core::generate_id;
use kirana_outbox::TransactionalEventBus;

use crate::clients::{InvoiceDocument, InvoiceLine, InvoiceRenderer};
use crate::entities::order::OrderStatus;
use crate::entities::{invoice, order, order_item};
use crate::error::{OrdersError, OrdersResult};
use crate::services::{sequence, EngineConfig};
use crate::types::TaxLine;

pub const SYSTEM_GENERATOR: &str = "system";

pub struct InvoiceService {
    db: DatabaseConnection,
    events: TransactionalEventBus,
    renderer: Arc<dyn InvoiceRenderer>,
    config: EngineConfig,
}

impl InvoiceService {
    pub fn new(
        db: DatabaseConnection,
        events: TransactionalEventBus,
        renderer: Arc<dyn InvoiceRenderer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            events,
            renderer,
            config,
        }
    }

    pub async fn get(&self, invoice_id: Uuid) -> OrdersResult<invoice::Model> {
        invoice::Entity::find_by_id(invoice_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Invoice", invoice_id))
    }

    pub async fn for_order(&self, order_id: Uuid) -> OrdersResult<Option<invoice::Model>> {
        Ok(invoice::Entity::find()
            .filter(invoice::Column::OrderId.eq(order_id))
            .one(&self.db)
            .await?)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> OrdersResult<Vec<invoice::Model>> {
        let order_ids: Vec<Uuid> = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| row.id)
            .collect();
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(invoice::Entity::find()
            .filter(invoice::Column::OrderId.is_in(order_ids))
            .order_by_desc(invoice::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Generate (or regenerate) the invoice for an order.
    #[instrument(skip(self))]
    pub async fn generate(&self, order_id: Uuid, generated_by: &str) -> OrdersResult<invoice::Model> {
        let order = order::Entity::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Order", order_id))?;
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&self.db)
            .await?;

        let existing = self.for_order(order_id).await?;
        let now = Utc::now();

        let lines: Vec<InvoiceLine> = items
            .iter()
            .map(|item| InvoiceLine {
                name: item.name.clone(),
                sku: item.sku.clone(),
                hsn_code: item.hsn_code.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_discount: item.line_discount,
                line_tax: item.line_tax,
                line_total: item.line_total,
            })
            .collect();
        let tax_lines = tax_breakdown(&items);

        let txn = self.db.begin().await?;
        let invoice_number = match &existing {
            Some(existing) => existing.invoice_number.clone(),
            None => {
                sequence::allocate(
                    &txn,
                    sequence::KIND_INVOICE,
                    now,
                    self.config.tz_offset_minutes,
                )
                .await?
            }
        };

        let document = InvoiceDocument {
            invoice_number: invoice_number.clone(),
            order_number: order.order_number.clone(),
            customer: serde_json::from_value(order.contact.clone())?,
            billing_address: serde_json::from_value(order.billing_address.clone())?,
            lines,
            tax_lines: tax_lines.clone(),
            totals: serde_json::from_value(order.totals.clone())?,
        };

        let storage_key = self
            .renderer
            .render(&document)
            .await
            .map_err(|_| OrdersError::DownstreamUnavailable { service: "invoice-renderer" })?;

        let saved = match existing {
            Some(existing) => {
                let invoice_id = existing.id;
                let mut active: invoice::ActiveModel = existing.into();
                active.storage_key = Set(storage_key);
                active.generated_by = Set(generated_by.to_string());
                active.updated_at = Set(now);
                let updated = active.update(&txn).await?;
                tracing::info!(invoice_id = %invoice_id, "invoice regenerated");
                updated
            }
            None => {
                let model = invoice::ActiveModel {
                    id: Set(generate_id()),
                    invoice_number: Set(invoice_number.clone()),
                    order_id: Set(order_id),
                    tax_lines: Set(serde_json::to_value(&tax_lines)?),
                    totals: Set(order.totals.clone()),
                    generated_by: Set(generated_by.to_string()),
                    storage_key: Set(storage_key),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                let created = model.insert(&txn).await?;
                self.events
                    .publish_in_tx(
                        &txn,
                        None,
                        DomainEvent::InvoiceGenerated {
                            invoice_id: created.id,
                            order_id,
                            invoice_number,
                        },
                    )
                    .await?;
                created
            }
        };
        txn.commit().await?;
        Ok(saved)
    }

    /// Create invoices for delivered orders that lack one. Bounded.
    #[instrument(skip(self))]
    pub async fn auto_invoice(&self, limit: u64) -> OrdersResult<usize> {
        let delivered = order::Entity::find()
            .filter(order::Column::Status.eq(OrderStatus::Delivered))
            .limit(limit)
            .all(&self.db)
            .await?;

        let mut generated = 0;
        for row in delivered {
            if self.for_order(row.id).await?.is_some() {
                continue;
            }
            match self.generate(row.id, SYSTEM_GENERATOR).await {
                Ok(_) => generated += 1,
                Err(error) => {
                    tracing::warn!(order_id = %row.id, %error, "auto-invoice skipped");
                }
            }
        }
        Ok(generated)
    }
}

/// Tax breakdown grouped by HSN code. Lines without one fall under "0000".
fn tax_breakdown(items: &[order_item::Model]) -> Vec<TaxLine> {
    let mut by_hsn: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    for item in items {
        let hsn = item.hsn_code.clone().unwrap_or_else(|| "0000".to_string());
        let entry = by_hsn.entry(hsn).or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 += item.line_total - item.line_tax;
        entry.1 += item.line_tax;
    }
    by_hsn
        .into_iter()
        .map(|(hsn_code, (taxable_value, tax_amount))| {
            let rate_percent = if taxable_value > Decimal::ZERO {
                round_money(tax_amount / taxable_value * Decimal::from(100))
            } else {
                Decimal::ZERO
            };
            TaxLine {
                hsn_code,
                taxable_value: round_money(taxable_value),
                rate_percent,
                tax_amount: round_money(tax_amount),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(hsn: Option<&str>, line_total: Decimal, line_tax: Decimal) -> order_item::Model {
        let now = Utc::now();
        order_item::Model {
            id: generate_id(),
            order_id: generate_id(),
            product_id: generate_id(),
            variant_id: generate_id(),
            bundle_id: None,
            sku: None,
            name: "Herbal tea".to_string(),
            image_url: None,
            hsn_code: hsn.map(str::to_string),
            quantity: 1,
            quantity_fulfilled: 0,
            quantity_returned: 0,
            quantity_refunded: 0,
            unit_price: line_total,
            unit_mrp: line_total,
            line_discount: Decimal::ZERO,
            line_tax,
            line_total,
            is_free_gift: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn groups_tax_by_hsn() {
        let items = vec![
            item(Some("3004"), dec!(112.00), dec!(12.00)),
            item(Some("3004"), dec!(224.00), dec!(24.00)),
            item(None, dec!(50.00), dec!(0.00)),
        ];
        let breakdown = tax_breakdown(&items);
        assert_eq!(breakdown.len(), 2);
        let hsn3004 = breakdown.iter().find(|line| line.hsn_code == "3004").unwrap();
        assert_eq!(hsn3004.taxable_value, dec!(300.00));
        assert_eq!(hsn3004.tax_amount, dec!(36.00));
        assert_eq!(hsn3004.rate_percent, dec!(12.00));
    }
}
