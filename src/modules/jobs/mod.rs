use crate::common::response::ApiError;
use crate::common::upload::upload_limit_message;
use crate::state::AppState;
use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;

pub mod dto;
pub mod error;
pub mod events;
pub mod handler;
pub mod lifecycle;
pub mod model;
pub mod repository;
pub mod scratch;
pub mod service;

// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router<AppState> {
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    let upload_routes = Router::new()
        .route("/upload", post(handler::upload))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit))
        .layer(middleware::map_response_with_state(
            state.clone(),
            envelope_payload_too_large,
        ));

    Router::new()
        .route("/status/{id}", get(handler::status))
        .route("/download/{id}", get(handler::download))
        .merge(upload_routes)
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}

/// `RequestBodyLimitLayer` answers oversized bodies with a bare 413; give it the usual envelope.
async fn envelope_payload_too_large(State(state): State<AppState>, response: Response) -> Response {
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }
    ApiError(
        upload_limit_message(state.config.max_upload_bytes),
        StatusCode::PAYLOAD_TOO_LARGE,
    )
    .into_response()
}
