//! Dashboard request handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use crate::storage::TelemetryStore;

use super::error::DashboardError;
use super::render::{self, OperationalSummary};

/// State shared by every request
///
/// The store is handed over at construction; handlers never open their own.
#[derive(Clone)]
pub struct DashboardState {
    pub store: Arc<dyn TelemetryStore>,
    pub summary: Arc<OperationalSummary>,
}

/// GET / and GET /dashboard
#[instrument(skip(state))]
pub async fn dashboard_page(
    State(state): State<DashboardState>,
) -> Result<Response, DashboardError> {
    let view = render::load_view(state.store.as_ref()).await?;
    let html = render::render(&view, &state.summary)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        html,
    )
        .into_response())
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 Not Found")
}
