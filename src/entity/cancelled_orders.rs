use sea_orm::entity::prelude::*;

/// Archive of cancelled orders; `snapshot` holds the full order with its items.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cancelled_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub original_order_id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub total: i64,
    pub cancellation_reason: String,
    pub notes: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: DateTimeWithTimeZone,
    pub carrier_order_id: Option<String>,
    pub tracking_number: Option<String>,
    pub snapshot: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
