use common::Version;
use docstore_models::Document;
use utoipa::OpenApi;

use super::documents;
use crate::error::InternalError;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Docstore",
        description = "All HTTP endpoints of Docstore",
        license(name = "LGPL", url = "https://www.gnu.org/licenses/lgpl-3.0.html"),
    ),
    paths(
        super::health,
        super::version,
        documents::list,
        documents::create,
        documents::get,
        documents::download,
        documents::update,
        documents::delete,
    ),
    components(schemas(
        Document,
        Version,
        InternalError,
        documents::DeletedDocument,
        documents::DocumentForm,
    )),
    tags(
        (name = "documents", description = "Text documents and their attached files"),
    ),
)]
pub struct OpenApiRoot;

impl OpenApiRoot {
    pub fn build_openapi() -> utoipa::openapi::OpenApi {
        Self::openapi()
    }
}
