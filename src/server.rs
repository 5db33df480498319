use std::net::SocketAddr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info};

use crate::error::StatsError;
use crate::models::StatisticsReport;
use crate::stats::GradeStatistics;

pub fn router(stats: GradeStatistics) -> Router {
    Router::new()
        .route("/stats", get(global_stats))
        .route("/stats/{id}", get(class_stats))
        .with_state(stats)
}

pub async fn serve(addr: SocketAddr, stats: GradeStatistics) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "serving grade statistics");
    axum::serve(listener, router(stats)).await?;
    Ok(())
}

async fn global_stats(
    State(stats): State<GradeStatistics>,
) -> Result<Json<StatisticsReport>, StatsError> {
    Ok(Json(stats.global().await?))
}

async fn class_stats(
    State(stats): State<GradeStatistics>,
    Path(id): Path<String>,
) -> Result<Json<StatisticsReport>, StatsError> {
    Ok(Json(stats.for_class(&id).await?))
}

impl IntoResponse for StatsError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            StatsError::InvalidClassId { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            StatsError::StoreUnavailable(source) => {
                error!(error = %source, "grade store query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "grade store unavailable".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
