use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use loan_agent::workflows::loan::{loan_router, LoanSessionService, SessionStore};

pub(crate) fn with_loan_routes<S>(service: Arc<LoanSessionService<S>>) -> axum::Router
where
    S: SessionStore + 'static,
{
    loan_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{build_collaborators, InMemorySessionStore};
    use axum::body::Body;
    use axum::http::Request;
    use loan_agent::workflows::loan::{UnderwritingPolicy, WorkflowEngine};
    use tower::ServiceExt;

    fn test_router() -> axum::Router {
        let collaborators = build_collaborators(std::env::temp_dir().join("loan-agent-tests"));
        let engine = WorkflowEngine::new(collaborators, UnderwritingPolicy::default());
        let service = Arc::new(LoanSessionService::new(
            InMemorySessionStore::default(),
            engine,
        ));
        with_loan_routes(service)
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let response = test_router()
            .oneshot(
                Request::get("/health")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chat_route_greets_seeded_customers() {
        let payload = json!({
            "phone": "+917835414968",
            "message": "Hello, I need a loan",
        });

        let response = test_router()
            .oneshot(
                Request::post("/api/v1/loan/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
        assert_eq!(value["loan_status"], "negotiating");
        assert!(value["reply"]
            .as_str()
            .is_some_and(|reply| reply.contains("Amit")));
    }

    #[tokio::test]
    async fn unknown_session_status_is_not_found() {
        let response = test_router()
            .oneshot(
                Request::get("/api/v1/loan/sessions/loan-404404")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
