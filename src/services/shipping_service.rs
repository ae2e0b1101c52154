use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait};

use crate::{
    audit,
    dto::shipping::{CommuneList, GeographyImportSummary, QuoteQuery, ShippingQuote, WilayaList},
    entity::{
        communes::{
            ActiveModel as CommuneActive, Column as CommuneCol, Entity as Communes,
            Model as CommuneModel,
        },
        wilayas::{ActiveModel as WilayaActive, Column as WilayaCol, Entity as Wilayas, Model as WilayaModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Commune, Wilaya},
    pricing,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Pulls wilayas, communes and delivery fees from the carrier and upserts them.
///
/// Names, postal codes, desk availability and wilaya prices follow the carrier.
/// `is_active`, Arabic names and commune price overrides are left as edited locally.
pub async fn import_geography(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<GeographyImportSummary>> {
    ensure_admin(user)?;

    let wilayas = state.carrier.fetch_wilayas().await?;
    let communes = state.carrier.fetch_communes(None).await?;
    let fees = state.carrier.fetch_fees().await?;
    let now = Utc::now();

    let mut summary = GeographyImportSummary::default();
    let txn = state.orm.begin().await?;

    for wilaya in &wilayas {
        let home_price = fees.home_price(wilaya.id);
        let desk_price = fees.desk_price(wilaya.id);
        if home_price.is_some() || desk_price.is_some() {
            summary.priced_wilayas += 1;
        }
        let active = WilayaActive {
            id: Set(wilaya.id),
            name: Set(wilaya.name.clone()),
            name_ar: Set(None),
            is_active: Set(true),
            home_price: Set(home_price),
            desk_price: Set(desk_price),
            updated_at: Set(now.into()),
        };
        Wilayas::insert(active)
            .on_conflict(
                OnConflict::column(WilayaCol::Id)
                    .update_columns([
                        WilayaCol::Name,
                        WilayaCol::HomePrice,
                        WilayaCol::DeskPrice,
                        WilayaCol::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&txn)
            .await?;
        summary.wilayas += 1;
    }

    for commune in &communes {
        if !wilayas.iter().any(|w| w.id == commune.wilaya_id) {
            tracing::warn!(commune_id = commune.id, wilaya_id = commune.wilaya_id, "commune of unknown wilaya skipped");
            continue;
        }
        let active = CommuneActive {
            id: Set(commune.id),
            wilaya_id: Set(commune.wilaya_id),
            name: Set(commune.name.clone()),
            name_ar: Set(None),
            postal_code: Set(commune.postal_code.clone()),
            has_desk_delivery: Set(commune.has_desk_delivery),
            is_active: Set(true),
            home_price: Set(None),
            desk_price: Set(None),
            updated_at: Set(now.into()),
        };
        Communes::insert(active)
            .on_conflict(
                OnConflict::column(CommuneCol::Id)
                    .update_columns([
                        CommuneCol::WilayaId,
                        CommuneCol::Name,
                        CommuneCol::PostalCode,
                        CommuneCol::HasDeskDelivery,
                        CommuneCol::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&txn)
            .await?;
        summary.communes += 1;
    }

    txn.commit().await?;

    tracing::info!(
        wilayas = summary.wilayas,
        communes = summary.communes,
        priced_wilayas = summary.priced_wilayas,
        "geography imported"
    );
    audit::record(
        &state.pool,
        Some(user.user_id),
        "geography_imported",
        "wilayas",
        serde_json::json!({ "wilayas": summary.wilayas, "communes": summary.communes }),
    )
    .await;

    Ok(ApiResponse::success("Geography imported", summary, Some(Meta::empty())))
}

pub async fn list_wilayas(state: &AppState) -> AppResult<ApiResponse<WilayaList>> {
    let items: Vec<Wilaya> = Wilayas::find()
        .filter(WilayaCol::IsActive.eq(true))
        .order_by_asc(WilayaCol::Id)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(wilaya_from_entity)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Wilayas",
        WilayaList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn list_communes(state: &AppState, wilaya_id: i32) -> AppResult<ApiResponse<CommuneList>> {
    Wilayas::find_by_id(wilaya_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items: Vec<Commune> = Communes::find()
        .filter(CommuneCol::WilayaId.eq(wilaya_id))
        .filter(CommuneCol::IsActive.eq(true))
        .order_by_asc(CommuneCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(commune_from_entity)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Communes",
        CommuneList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn quote(state: &AppState, query: QuoteQuery) -> AppResult<ApiResponse<ShippingQuote>> {
    let wilaya = Wilayas::find_by_id(query.wilaya_id)
        .one(&state.orm)
        .await?
        .map(wilaya_from_entity)
        .filter(|w| w.is_active)
        .ok_or(AppError::NotFound)?;

    let commune = match query.commune_id {
        Some(commune_id) => Some(
            Communes::find_by_id(commune_id)
                .one(&state.orm)
                .await?
                .map(commune_from_entity)
                .filter(|c| c.wilaya_id == wilaya.id && c.is_active)
                .ok_or(AppError::NotFound)?,
        ),
        None => None,
    };

    let price = pricing::shipping_cost(&wilaya, commune.as_ref(), query.delivery_type).ok_or_else(|| {
        AppError::BadRequest(format!(
            "No {} delivery price for wilaya {}",
            query.delivery_type.as_str(),
            wilaya.id
        ))
    })?;

    let data = ShippingQuote {
        wilaya_id: wilaya.id,
        commune_id: query.commune_id,
        delivery_type: query.delivery_type,
        price,
    };
    Ok(ApiResponse::success("Shipping quote", data, Some(Meta::empty())))
}

pub fn wilaya_from_entity(model: WilayaModel) -> Wilaya {
    Wilaya {
        id: model.id,
        name: model.name,
        name_ar: model.name_ar,
        is_active: model.is_active,
        home_price: model.home_price,
        desk_price: model.desk_price,
    }
}

pub fn commune_from_entity(model: CommuneModel) -> Commune {
    Commune {
        id: model.id,
        wilaya_id: model.wilaya_id,
        name: model.name,
        name_ar: model.name_ar,
        postal_code: model.postal_code,
        has_desk_delivery: model.has_desk_delivery,
        is_active: model.is_active,
        home_price: model.home_price,
        desk_price: model.desk_price,
    }
}
