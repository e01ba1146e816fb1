use utoipa::OpenApi;

use crate::routes::{health, v1};

#[derive(OpenApi)]
#[openapi(info(
    title = "formvideo-server",
    description = "Turns recorded form-filling videos into structured form data",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(v1::api_docs());
    root
}
