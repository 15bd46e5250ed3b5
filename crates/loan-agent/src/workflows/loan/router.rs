use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use mime::Mime;
use serde_json::json;

use super::domain::SessionId;
use super::engine::WorkflowError;
use super::repository::SessionStore;
use super::service::{ChatTurn, LoanSessionService, SessionServiceError};

/// Router builder exposing the conversational loan endpoints.
pub fn loan_router<S>(service: Arc<LoanSessionService<S>>) -> Router
where
    S: SessionStore + 'static,
{
    Router::new()
        .route("/api/v1/loan/chat", post(chat_handler::<S>))
        .route(
            "/api/v1/loan/sessions/:session_id/salary-slip",
            post(upload_handler::<S>),
        )
        .route(
            "/api/v1/loan/sessions/:session_id/sanction-letter",
            get(sanction_letter_handler::<S>),
        )
        .route(
            "/api/v1/loan/sessions/:session_id",
            get(status_handler::<S>).delete(delete_handler::<S>),
        )
        .route("/api/v1/loan/sessions", get(list_handler::<S>))
        .with_state(service)
}

pub(crate) async fn chat_handler<S>(
    State(service): State<Arc<LoanSessionService<S>>>,
    axum::Json(turn): axum::Json<ChatTurn>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.chat(turn) {
        Ok(reply) => (StatusCode::OK, axum::Json(reply)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn upload_handler<S>(
    State(service): State<Arc<LoanSessionService<S>>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: SessionStore + 'static,
{
    let Some(mime) = content_type(&headers) else {
        let payload = json!({ "error": "a Content-Type header describing the document is required" });
        return (StatusCode::UNSUPPORTED_MEDIA_TYPE, axum::Json(payload)).into_response();
    };

    match service.submit_salary_slip(SessionId(session_id), &body, &mime) {
        Ok(reply) => (StatusCode::OK, axum::Json(reply)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn sanction_letter_handler<S>(
    State(service): State<Arc<LoanSessionService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.sanction_letter(&SessionId(session_id)) {
        Ok(document) => {
            let filename = document
                .reference
                .0
                .rsplit('/')
                .next()
                .unwrap_or("sanction-letter")
                .to_string();
            let headers = [
                (
                    header::CONTENT_TYPE,
                    mime::APPLICATION_OCTET_STREAM.to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ];
            (StatusCode::OK, headers, document.bytes).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<S>(
    State(service): State<Arc<LoanSessionService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.status(&SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_handler<S>(
    State(service): State<Arc<LoanSessionService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.delete(&SessionId(session_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<S>(
    State(service): State<Arc<LoanSessionService<S>>>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.sessions() {
        Ok(sessions) => {
            (StatusCode::OK, axum::Json(json!({ "sessions": sessions }))).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn content_type(headers: &HeaderMap) -> Option<Mime> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Mime>().ok())
}

/// Map service failures to transport status codes. User-caused failures keep
/// their message; internal failures return a generic line so collaborator
/// details never leak to the caller.
fn error_response(err: SessionServiceError) -> Response {
    let (status, message) = match &err {
        SessionServiceError::NotFound(_)
        | SessionServiceError::SanctionLetterUnavailable(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        SessionServiceError::UnreadableDocument => {
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        SessionServiceError::Workflow(WorkflowError::Collaborator(_)) => (
            StatusCode::BAD_GATEWAY,
            "a downstream service is unavailable, please retry shortly".to_string(),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "request could not be processed".to_string(),
        ),
    };

    let payload = json!({ "error": message });
    (status, axum::Json(payload)).into_response()
}
