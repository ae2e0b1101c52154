use sea_orm::entity::prelude::*;

/// A null price means the commune inherits its wilaya's price.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "communes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub wilaya_id: i32,
    pub name: String,
    pub name_ar: Option<String>,
    pub postal_code: Option<String>,
    pub has_desk_delivery: bool,
    pub is_active: bool,
    pub home_price: Option<i64>,
    pub desk_price: Option<i64>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wilayas::Entity",
        from = "Column::WilayaId",
        to = "super::wilayas::Column::Id"
    )]
    Wilayas,
}

impl Related<super::wilayas::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wilayas.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
