use crate::common::response::ApiResponse;
use crate::modules::jobs::dto::{JobResponse, RetrievalReference, SubmitResponse};
use crate::modules::jobs::model::JobStatus;
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::jobs::handler::upload,
        crate::modules::jobs::handler::status,
        crate::modules::jobs::handler::download,
    ),
    components(
        schemas(
            JobStatus,
            JobResponse,
            SubmitResponse,
            RetrievalReference,
            ApiResponse<JobResponse>,
            ApiResponse<SubmitResponse>,
            ApiResponse<RetrievalReference>,
        )
    ),
    tags(
        (name = "Transcode", description = "Video upload, transcoding status and download")
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
