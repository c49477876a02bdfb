#![allow(elided_lifetimes_in_paths)]

pub use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(kirana_orders::migration::OrdersTablesMigration),
            Box::new(kirana_outbox::migration::OutboxEventsMigration),
        ]
    }
}
