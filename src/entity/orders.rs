use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub wilaya_id: i32,
    pub wilaya_name: String,
    pub commune_id: i32,
    pub commune_name: String,
    pub postal_code: Option<String>,
    pub delivery_type: String,
    pub address: String,
    pub notes: Option<String>,
    pub subtotal: i64,
    pub bundle_discount: i64,
    pub applied_bundles: Json,
    pub shipping_cost: i64,
    pub total: i64,
    pub payment_method: String,
    pub payment_status: String,
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub status: String,
    pub confirmed_at: Option<DateTimeWithTimeZone>,
    pub delivery_date: Option<DateTimeWithTimeZone>,
    pub carrier_order_id: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier_status: Option<String>,
    pub carrier_synced_at: Option<DateTimeWithTimeZone>,
    pub expedition_claimed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
