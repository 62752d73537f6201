use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::db::DbPool;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: CheckStatus,
    pub database: CheckStatus,
}

pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn readiness(State(pool): State<DbPool>) -> impl IntoResponse {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&pool).await {
        Ok(_) => CheckStatus::Healthy,
        Err(err) => {
            tracing::warn!(error = %err, "readiness check: database unreachable");
            CheckStatus::Unhealthy
        }
    };

    let status = if database == CheckStatus::Healthy {
        CheckStatus::Healthy
    } else {
        CheckStatus::Unhealthy
    };

    let code = if status == CheckStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(ReadinessResponse { status, database }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let response = liveness().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
