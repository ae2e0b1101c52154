use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        bundles::{BundleList, CreateBundleRequest},
        orders::{
            BulkExpediteSummary, CancelOrderRequest, CancelledOrderList, CreateOrderRequest,
            OrderIdsRequest, OrderItemInput, OrderList, ReplaceItemsRequest, SendOrderResult,
            SyncStatusesRequest,
        },
        shipping::{CommuneList, GeographyImportSummary, ShippingQuote, WilayaList},
    },
    lifecycle::{CancellationReason, OrderStatus, PipelineStage},
    models::{
        AppliedBundle, CancellationInfo, CancelledOrder, Commune, DeliveryType, DiscountKind,
        Order, OrderItem, PaymentStatus, ProductBundle, Wilaya,
    },
    response::{ApiResponse, ErrorBody, Meta},
    routes::{bundles, health, orders, params, shipping},
    services::{
        expedition::{ExpeditionFailure, ExpeditionReport, ExpeditionSuccess, SkippedOrder},
        status_sync::{SyncDetail, SyncReport, SyncResult},
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::replace_items,
        orders::confirm_order,
        orders::cancel_order,
        orders::send_order,
        orders::expediate_bulk,
        orders::send_to_ecotrack,
        orders::sync_statuses,
        orders::list_cancelled,
        orders::get_cancelled,
        shipping::list_wilayas,
        shipping::list_communes,
        shipping::quote,
        shipping::import_geography,
        bundles::list_bundles,
        bundles::create_bundle
    ),
    components(
        schemas(
            ErrorBody,
            Order,
            OrderItem,
            OrderStatus,
            PipelineStage,
            CancellationReason,
            CancellationInfo,
            CancelledOrder,
            AppliedBundle,
            DeliveryType,
            PaymentStatus,
            DiscountKind,
            ProductBundle,
            Wilaya,
            Commune,
            OrderItemInput,
            CreateOrderRequest,
            ReplaceItemsRequest,
            CancelOrderRequest,
            OrderIdsRequest,
            SyncStatusesRequest,
            BulkExpediteSummary,
            SendOrderResult,
            OrderList,
            CancelledOrderList,
            ExpeditionReport,
            ExpeditionSuccess,
            ExpeditionFailure,
            SkippedOrder,
            SyncReport,
            SyncDetail,
            SyncResult,
            WilayaList,
            CommuneList,
            ShippingQuote,
            GeographyImportSummary,
            CreateBundleRequest,
            BundleList,
            params::Pagination,
            params::OrderListQuery,
            params::CancelledListQuery,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<ExpeditionReport>,
            ApiResponse<SyncReport>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Lifecycle", description = "Confirmation, cancellation and carrier hand-off"),
        (name = "Shipping", description = "Wilayas, communes and delivery prices"),
        (name = "Bundles", description = "Quantity bundle offers"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
