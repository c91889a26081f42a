pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_stored_requests;
mod m20260301_000002_create_stored_events;
mod m20260301_000003_create_payments;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_stored_requests::Migration),
            Box::new(m20260301_000002_create_stored_events::Migration),
            Box::new(m20260301_000003_create_payments::Migration),
        ]
    }
}
