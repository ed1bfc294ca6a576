use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::transfer::transfer,
        api::health::health,
    ),
    components(
        schemas(
            transfer_types::ErrorEnvelope,
            transfer_types::UnsupportedVerbEnvelope,
            transfer_types::UploadReceipt,
            api::health::HealthResponse,
        )
    ),
    tags(
        (name = "transfer-server", description = "File upload/download test endpoint")
    )
)]
pub struct ApiDoc;
