use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

/// Fresh in-memory sqlite database with the order and outbox schemas
/// applied. Each call returns an isolated database.
///
/// `sqlite::memory:` gives each physical connection its own private
/// database, so the pool is pinned to a single connection here — matching
/// `apps/server/config/test.yaml` — or a second connection would see an
/// empty, unmigrated database.
pub async fn setup_test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options)
        .await
        .expect("connect to in-memory sqlite");

    kirana_orders::migration::Migrator::up(&db, None)
        .await
        .expect("apply order migrations");
    OutboxMigrator::up(&db, None)
        .await
        .expect("apply outbox migrations");

    db
}

struct OutboxMigrator;

#[async_trait::async_trait]
impl MigratorTrait for OutboxMigrator {
    fn migrations() -> Vec<Box<dyn sea_orm_migration::MigrationTrait>> {
        vec![Box::new(kirana_outbox::migration::OutboxEventsMigration)]
    }
}
