use sea_orm_migration::prelude::*;

use paygate_payments_migration::Migrator;

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
