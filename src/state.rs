use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    carrier::Carrier,
    config::CarrierConfig,
    db::{DbPool, OrmConn},
    store::OrderStore,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub store: Arc<dyn OrderStore>,
    pub carrier: Arc<dyn Carrier>,
    pub carrier_config: Arc<CarrierConfig>,
    pub jwt_secret: Arc<str>,
    /// Cancelled on shutdown; long-running operations take child tokens.
    pub shutdown: CancellationToken,
}
