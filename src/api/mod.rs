//! HTTP routes for every content type plus the phones proxy.
//!
//! Each store-backed resource gets the same route set from [`crud::routes`]:
//!
//! - `GET    {path}?start&limit` newest-first page of records
//! - `GET    {path}/:id` a single record
//! - `POST   {path}` create
//! - `PUT    {path}` update by body `id` (if the resource allows it)
//! - `DELETE {path}` delete by body `id` (if the resource allows it)
//!
//! Every response uses the `{success, data?, message?}` envelope.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tracing::error;

use crate::config::Pagination;
use crate::db::Pool;
use crate::model::Envelope;
use crate::phones::PhonesUpstream;
use crate::resource;

pub mod crud;
pub mod error;
pub mod phones;

pub use error::{ApiError, ApiResult};

/// Shared by all handlers. Holds no per-request state.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub pagination: Pagination,
    pub phones: Option<Arc<dyn PhonesUpstream>>,
}

impl AppState {
    pub fn new(pool: Pool, pagination: Pagination) -> Self {
        Self {
            pool,
            pagination,
            phones: None,
        }
    }

    pub fn with_phones(mut self, phones: Arc<dyn PhonesUpstream>) -> Self {
        self.phones = Some(phones);
        self
    }
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(health));
    for resource in resource::ALL.iter().copied() {
        router = router.merge(crud::routes(resource));
    }
    router.merge(phones::routes()).with_state(state)
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<Envelope<()>>> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map_err(|err| {
            error!(?err, "health check failed");
            ApiError::Store("Database unavailable.".into())
        })?;
    Ok(Json(Envelope {
        success: true,
        data: None,
        message: Some("ok".into()),
    }))
}
