use sea_orm::entity::prelude::*;

/// Event that could not be handed to the message transport when it was published.
/// `processed` flips to true once the event is redelivered and never reverts.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "stored_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub queue: String,
    pub kind: String,
    pub message: Json,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub processed: bool,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
