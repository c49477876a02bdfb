use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Durable per-(kind, year) sequence backing the human-readable
/// `ORD|REF|RET|INV-YYYY-NNNNNN` identifiers. Incremented with a
/// compare-and-set update so restarts and replicas never hand out
/// duplicates.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "number_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: String,
    pub year: i32,
    pub next_value: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
