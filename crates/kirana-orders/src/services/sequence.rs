//! Durable identifier sequences.
//!
//! Human-readable numbers (`ORD-2026-000042`) come from a per-(kind, year)
//! row in `number_sequences`, claimed with a compare-and-set update. Unlike
//! an in-process counter this survives restarts and is correct across
//! replicas: a lost CAS means another writer took the value, so we re-read
//! and try again.

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use kirana_core::generate_id;

use crate::entities::number_sequence;
use crate::error::{OrdersError, OrdersResult};

pub const KIND_ORDER: &str = "ORD";
pub const KIND_REFUND: &str = "REF";
pub const KIND_RETURN: &str = "RET";
pub const KIND_INVOICE: &str = "INV";

const MAX_CAS_ATTEMPTS: usize = 16;

pub fn format_number(kind: &str, year: i32, value: i64) -> String {
    format!("{kind}-{year}-{value:06}")
}

/// Year in the business timezone; a sequence rolls over at local midnight,
/// not UTC midnight.
pub fn business_year(now: DateTime<Utc>, tz_offset_minutes: i32) -> i32 {
    let offset = FixedOffset::east_opt(tz_offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    now.with_timezone(&offset).year()
}

/// Claim the next value of the (kind, year) sequence.
pub async fn next_value<C: ConnectionTrait>(
    conn: &C,
    kind: &str,
    year: i32,
) -> OrdersResult<i64> {
    for _ in 0..MAX_CAS_ATTEMPTS {
        let existing = number_sequence::Entity::find()
            .filter(number_sequence::Column::Kind.eq(kind))
            .filter(number_sequence::Column::Year.eq(year))
            .one(conn)
            .await?;

        match existing {
            Some(row) => {
                let current = row.next_value;
                let claimed = number_sequence::Entity::update_many()
                    .col_expr(
                        number_sequence::Column::NextValue,
                        sea_orm::sea_query::Expr::value(current + 1),
                    )
                    .filter(number_sequence::Column::Id.eq(row.id))
                    .filter(number_sequence::Column::NextValue.eq(current))
                    .exec(conn)
                    .await?;
                if claimed.rows_affected == 1 {
                    return Ok(current);
                }
                // Lost the race; re-read and retry.
            }
            None => {
                let insert = number_sequence::Entity::insert(number_sequence::ActiveModel {
                    id: Set(generate_id()),
                    kind: Set(kind.to_string()),
                    year: Set(year),
                    next_value: Set(2),
                })
                .exec_without_returning(conn)
                .await;
                match insert {
                    Ok(_) => return Ok(1),
                    // Unique (kind, year) violation: another writer seeded
                    // the row first. Retry against it.
                    Err(_) => continue,
                }
            }
        }
    }

    Err(OrdersError::Internal(format!(
        "could not claim {kind}-{year} sequence after {MAX_CAS_ATTEMPTS} attempts"
    )))
}

/// Allocate a formatted identifier for `kind` at `now`.
pub async fn allocate<C: ConnectionTrait>(
    conn: &C,
    kind: &str,
    now: DateTime<Utc>,
    tz_offset_minutes: i32,
) -> OrdersResult<String> {
    let year = business_year(now, tz_offset_minutes);
    let value = next_value(conn, kind, year).await?;
    Ok(format_number(kind, year, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero_padded_six_digits() {
        assert_eq!(format_number(KIND_ORDER, 2026, 1), "ORD-2026-000001");
        assert_eq!(format_number(KIND_INVOICE, 2026, 123456), "INV-2026-123456");
        assert_eq!(format_number(KIND_REFUND, 2026, 1234567), "REF-2026-1234567");
    }

    #[test]
    fn business_year_rolls_at_local_midnight() {
        // 2025-12-31 19:00 UTC is already 2026-01-01 00:30 IST.
        let utc = DateTime::parse_from_rfc3339("2025-12-31T19:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(business_year(utc, 330), 2026);
        assert_eq!(business_year(utc, 0), 2025);
    }
}
