use super::dto::{JobResponse, RetrievalReference, SubmitResponse};
use super::service::JobService;
use crate::common::response::{ApiError, ApiResponse, ApiResult, ApiSuccess};
use crate::common::upload::save_field_to_disk;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use axum::{
    extract::{Extension, Multipart, Path, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Upload a video and start transcoding it.
/// Returns as soon as the job is recorded; poll the status endpoint for the outcome.
#[utoipa::path(
    post,
    path = "/api/transcode/upload",
    request_body(content = String, content_type = "multipart/form-data", description = "File part named `video`"),
    responses(
        (status = 202, description = "Transcoding started", body = ApiResponse<SubmitResponse>),
        (status = 400, description = "Missing, empty or unsupported file"),
        (status = 401, description = "Unauthenticated"),
        (status = 413, description = "Request body exceeds the upload limit"),
        (status = 500, description = "Server error")
    ),
    tag = "Transcode",
    security(("bearer_auth" = []))
)]
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<SubmitResponse> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("video") {
            continue;
        }

        let saved = save_field_to_disk(field, &state.config.upload_dir, state.config.max_upload_bytes).await?;
        let job_id = JobService::submit(&state, &user.username, &saved.path, &saved.original_name).await?;

        return Ok(ApiSuccess::accepted(SubmitResponse { job_id }, "Transcoding started"));
    }

    Err(ApiError("No file uploaded".to_string(), StatusCode::BAD_REQUEST))
}

/// Current state of one of the caller's jobs.
#[utoipa::path(
    get,
    path = "/api/transcode/status/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job snapshot", body = ApiResponse<JobResponse>),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Job not found or unauthorized")
    ),
    tag = "Transcode",
    security(("bearer_auth" = []))
)]
pub async fn status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<JobResponse> {
    let job = JobService::get_status(&state, id, &user.username).await?;
    Ok(ApiSuccess::ok(JobResponse::from(job), "Job retrieved"))
}

/// Time-limited download link for a completed job's output.
#[utoipa::path(
    get,
    path = "/api/transcode/download/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Signed download URL", body = ApiResponse<RetrievalReference>),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Job not found or unauthorized"),
        (status = 409, description = "Job not completed yet")
    ),
    tag = "Transcode",
    security(("bearer_auth" = []))
)]
pub async fn download(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<RetrievalReference> {
    let reference = JobService::get_retrieval_reference(&state, id, &user.username).await?;
    Ok(ApiSuccess::ok(reference, "Download link created"))
}
