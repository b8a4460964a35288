//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;

use super::AppState;
use super::types::{AnalyzeQuery, ErrorResponse, HealthResponse};
use crate::analysis::{Pipeline, TracingObserver};
use crate::error::{AnalysisError, ErrorKind};
use crate::report::AnalysisReport;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// `GET /health` → 200 + `{"status":"ok"}`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Runs a full analysis over the CSV request body.
///
/// `POST /analyze[?rated_kva=&interval_minutes=&datetime=]` → 200 + report JSON
/// - 400 + `ErrorResponse` for config, header or CSV encoding errors
/// - 422 + `ErrorResponse` when the data fails validation or a factor check
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyzeQuery>,
    body: Bytes,
) -> Result<Json<AnalysisReport>, ApiError> {
    let config = query.apply(&state.config);

    let outcome = tokio::task::spawn_blocking(move || {
        let pipeline = Pipeline::new(config, TracingObserver)?;
        let analysis = pipeline.run(&body[..])?;
        Ok::<_, AnalysisError>(AnalysisReport::from_analysis("request body", &analysis))
    })
    .await;

    match outcome {
        Ok(Ok(report)) => Ok(Json(report)),
        Ok(Err(e)) => {
            tracing::warn!(kind = ?e.kind(), error = %e, "analysis rejected");
            Err((
                status_for(e.kind()),
                Json(ErrorResponse {
                    kind: Some(e.kind()),
                    error: e.to_string(),
                }),
            ))
        }
        Err(join) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                kind: None,
                error: format!("analysis task failed: {join}"),
            }),
        )),
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Config | ErrorKind::Schema | ErrorKind::Io => StatusCode::BAD_REQUEST,
        ErrorKind::DataQuality | ErrorKind::EmptyResult | ErrorKind::FactorRange => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::config::RunConfig;

    const CSV: &str = "\
meter,date,time,kw
a,2024-08-04,00:00:00,5
b,2024-08-04,00:00:00,8
a,2024-08-04,00:15:00,10
b,2024-08-04,00:15:00,15
a,2024-08-04,00:30:00,3
b,2024-08-04,00:30:00,20
a,2024-08-04,00:45:00,2
b,2024-08-04,00:45:00,4
";

    fn make_test_state() -> Arc<AppState> {
        Arc::new(AppState::new(RunConfig::default()))
    }

    async fn post(uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = router(make_test_state()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_returns_200() {
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = router(make_test_state()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn analyze_returns_report() {
        let (status, json) = post("/analyze?rated_kva=30", CSV).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["results"]["peak"]["kw"], 25.0);
        assert!(json.get("capacity_distribution").is_some());
    }

    #[tokio::test]
    async fn bad_header_returns_400() {
        let (status, json) = post("/analyze", "when,load\n2024-08-04,1\n").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "schema");
    }

    #[tokio::test]
    async fn factor_violation_returns_422() {
        let body = "date,time,kw\n2024-08-04,00:00:00,5\n2024-08-04,00:15:00,5\n";
        let (status, json) = post("/analyze", body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["kind"], "factor_range");
    }

    #[tokio::test]
    async fn negative_capacity_returns_400() {
        let (status, json) = post("/analyze?rated_kva=-5", CSV).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "config");
    }
}
