use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Json;
use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::State;
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use docstore_models::Attachment;
use docstore_models::Document;
use docstore_models::DocumentId;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use utoipa::IntoParams;
use utoipa::ToSchema;

use crate::error::DocstoreError;
use crate::error::InternalError;
use crate::error::Result;
use crate::error::VALIDATION_ERROR;

#[derive(Debug, Error)]
enum DocumentError {
    #[error("Invalid form data: {reason}")]
    InvalidForm { reason: String },
    #[error("Invalid form data: field 'content' is required")]
    MissingContent,
    #[error(transparent)]
    Model(#[from] docstore_models::Error),
}

impl From<MultipartError> for DocumentError {
    fn from(error: MultipartError) -> Self {
        Self::InvalidForm {
            reason: error.body_text(),
        }
    }
}

impl From<MultipartRejection> for DocumentError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::InvalidForm {
            reason: rejection.body_text(),
        }
    }
}

impl DocstoreError for DocumentError {
    fn get_status(&self) -> StatusCode {
        match self {
            Self::InvalidForm { .. } | Self::MissingContent => StatusCode::BAD_REQUEST,
            Self::Model(error) => error.get_status(),
        }
    }

    fn get_type(&self) -> &str {
        match self {
            Self::InvalidForm { .. } | Self::MissingContent => VALIDATION_ERROR,
            Self::Model(error) => error.get_type(),
        }
    }

    fn context(&self) -> HashMap<String, Value> {
        match self {
            Self::InvalidForm { reason } => [("reason".to_string(), json!(reason))].into(),
            Self::MissingContent => [("field".to_string(), json!("content"))].into(),
            Self::Model(error) => error.context(),
        }
    }
}

/// Multipart form accepted to create or update a document
#[derive(ToSchema)]
#[allow(unused)] // Schema only
pub(in crate::views) struct DocumentForm {
    /// Text content of the document, must not be empty
    content: String,
    /// File attached to the document
    #[schema(value_type = Option<String>, format = Binary)]
    file: Option<Vec<u8>>,
}

struct DocumentFormData {
    content: String,
    attachment: Option<Attachment>,
}

/// Unknown fields are ignored, and a file part without a file name counts as no file
async fn parse_document_form(mut form: Multipart) -> Result<DocumentFormData, DocumentError> {
    let mut content = None;
    let mut attachment = None;
    while let Some(field) = form.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_owned();
        match field_name.as_str() {
            "content" => content = Some(field.text().await?),
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                attachment = Attachment::new(&file_name, field.bytes().await?);
            }
            _ => tracing::debug!(%field_name, "ignoring unknown form field"),
        }
    }
    let content = content
        .filter(|content| !content.is_empty())
        .ok_or(DocumentError::MissingContent)?;
    Ok(DocumentFormData {
        content,
        attachment,
    })
}

#[derive(IntoParams)]
#[into_params(parameter_in = Path)]
#[allow(unused)]
struct DocumentKeyParam {
    /// Key of a document, or of an attached file
    id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub(in crate::views) struct DeletedDocument {
    message: String,
}

#[utoipa::path(
    get, path = "/documents",
    tag = "documents",
    responses(
        (status = 200, description = "Every document of the container, and every attached file", body = Vec<Document>),
    ),
)]
pub(in crate::views) async fn list(
    State(storage): State<Arc<storage::Client>>,
) -> Result<Json<Vec<Document>>> {
    let documents = Document::list(&storage).await?;
    Ok(Json(documents))
}

#[utoipa::path(
    post, path = "/documents",
    tag = "documents",
    request_body(content = DocumentForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "The created document", body = Document),
        (status = 400, description = "The form is invalid", body = InternalError),
    ),
)]
pub(in crate::views) async fn create(
    State(storage): State<Arc<storage::Client>>,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Json<Document>> {
    let form = form.map_err(DocumentError::from)?;
    let DocumentFormData {
        content,
        attachment,
    } = parse_document_form(form).await?;

    let document = Document::changeset()
        .content(content)
        .flat_attachment(attachment)
        .create(&storage)
        .await?;
    Ok(Json(document))
}

#[utoipa::path(
    get, path = "/documents/{id}",
    tag = "documents",
    params(DocumentKeyParam),
    responses(
        (status = 200, description = "The document, with its content read as text", body = Document),
        (status = 404, description = "The document doesn't exist", body = InternalError),
    ),
)]
pub(in crate::views) async fn get(
    State(storage): State<Arc<storage::Client>>,
    Path(id): Path<String>,
) -> Result<Json<Document>> {
    let document = Document::retrieve(&storage, &id).await?;
    Ok(Json(document))
}

#[utoipa::path(
    get, path = "/documents/download/{id}",
    tag = "documents",
    params(DocumentKeyParam),
    responses(
        (status = 200, description = "The raw content of the document or file", content_type = "application/octet-stream", body = Vec<u8>),
        (status = 404, description = "The document doesn't exist", body = InternalError),
    ),
)]
pub(in crate::views) async fn download(
    State(storage): State<Arc<storage::Client>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let data = Document::download(&storage, &id).await?;
    Ok((
        [(
            header::CONTENT_TYPE,
            mime::APPLICATION_OCTET_STREAM.to_string(),
        )],
        data,
    ))
}

/// Replaces the content of a document, creating it if it doesn't exist
#[utoipa::path(
    put, path = "/documents/{id}",
    tag = "documents",
    params(DocumentKeyParam),
    request_body(content = DocumentForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "The stored document", body = Document),
        (status = 400, description = "The form or the document id is invalid", body = InternalError),
    ),
)]
pub(in crate::views) async fn update(
    State(storage): State<Arc<storage::Client>>,
    Path(id): Path<String>,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Json<Document>> {
    let id: DocumentId = id.parse()?;
    let form = form.map_err(DocumentError::from)?;
    let DocumentFormData {
        content,
        attachment,
    } = parse_document_form(form).await?;

    let document = Document::changeset()
        .content(content)
        .flat_attachment(attachment)
        .overwrite(&storage, id)
        .await?;
    Ok(Json(document))
}

/// Deletes a document along with its attached files, or a single attached file
#[utoipa::path(
    delete, path = "/documents/{id}",
    tag = "documents",
    params(DocumentKeyParam),
    responses(
        (status = 200, description = "The document was deleted", body = DeletedDocument),
        (status = 404, description = "The document doesn't exist", body = InternalError),
    ),
)]
pub(in crate::views) async fn delete(
    State(storage): State<Arc<storage::Client>>,
    Path(id): Path<String>,
) -> Result<Json<DeletedDocument>> {
    Document::delete(&storage, &id).await?;
    Ok(Json(DeletedDocument {
        message: "Document deleted successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::multipart::MultipartForm;
    use axum_test::multipart::Part;
    use docstore_models::Document;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::DeletedDocument;
    use crate::error::InternalError;
    use crate::views::test_app::TestApp;
    use crate::views::test_app::TestAppBuilder;

    fn text_form(content: &str) -> MultipartForm {
        MultipartForm::new().add_text("content", content.to_string())
    }

    fn form_with_file(content: &str, file_name: &str, data: &'static [u8]) -> MultipartForm {
        text_form(content).add_part(
            "file",
            Part::bytes(data)
                .file_name(file_name.to_string())
                .mime_type("application/octet-stream"),
        )
    }

    async fn create(app: &TestApp, form: MultipartForm) -> Document {
        let request = app.post("/documents").multipart(form);
        app.fetch(request)
            .await
            .assert_status(StatusCode::OK)
            .json_into()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn document_lifecycle() {
        let app = TestAppBuilder::default_app();

        let request = app.post("/documents").multipart(text_form("abc"));
        let created: serde_json::Value = app
            .fetch(request)
            .await
            .assert_status(StatusCode::OK)
            .json_into();
        let id = created["id"].as_str().expect("id should be a string").to_owned();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_eq!(created, json!({ "id": id, "content": "abc" }));

        let request = app.get(&format!("/documents/{id}"));
        let retrieved: serde_json::Value = app
            .fetch(request)
            .await
            .assert_status(StatusCode::OK)
            .json_into();
        assert_eq!(retrieved, created);

        let request = app.delete(&format!("/documents/{id}"));
        let deleted: DeletedDocument = app
            .fetch(request)
            .await
            .assert_status(StatusCode::OK)
            .json_into();
        assert_eq!(deleted.message, "Document deleted successfully");

        let request = app.get(&format!("/documents/{id}"));
        let error: InternalError = app
            .fetch(request)
            .await
            .assert_status(StatusCode::NOT_FOUND)
            .json_into();
        assert_eq!(error.get_type(), "docstore:NotFoundError");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn create_with_file() {
        let app = TestAppBuilder::default_app();

        let document = create(&app, form_with_file("hello", "f.txt", b"file data")).await;
        let file_id = format!("{}_f.txt", document.id);
        assert_eq!(document.file_id.as_deref(), Some(file_id.as_str()));

        let request = app.get("/documents/");
        let mut listed: Vec<Document> = app
            .fetch(request)
            .await
            .assert_status(StatusCode::OK)
            .json_into();
        listed.sort_by_key(|document| document.is_file);
        assert_eq!(
            listed,
            vec![
                Document {
                    id: document.id.clone(),
                    description: Some("hello".into()),
                    is_file: false,
                    content: "hello".into(),
                    file_id: None,
                },
                Document {
                    id: document.id.clone(),
                    description: Some("f.txt".into()),
                    is_file: true,
                    content: "f.txt".into(),
                    file_id: Some(file_id.clone()),
                },
            ]
        );

        let request = app.get(&format!("/documents/download/{file_id}"));
        let response = app.fetch(request).await.assert_status(StatusCode::OK);
        assert_eq!(response.content_type(), "application/octet-stream");
        assert_eq!(response.bytes(), b"file data".to_vec());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn file_part_without_name_is_no_attachment() {
        let app = TestAppBuilder::default_app();

        let document = create(&app, form_with_file("hello", "", b"")).await;

        assert_eq!(document.file_id, None);
        assert_eq!(app.storage().list().await.unwrap(), vec![document.id]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn unknown_fields_are_ignored() {
        let app = TestAppBuilder::default_app();

        let form = text_form("hello").add_text("title", "ignored");
        let document = create(&app, form).await;

        assert_eq!(document.content, "hello");
    }

    #[rstest]
    #[case::missing_content(MultipartForm::new().add_text("other", "x"))]
    #[case::empty_content(MultipartForm::new().add_text("content", ""))]
    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn create_rejects_invalid_forms(#[case] form: MultipartForm) {
        let app = TestAppBuilder::default_app();

        let request = app.post("/documents").multipart(form);
        let error: InternalError = app
            .fetch(request)
            .await
            .assert_status(StatusCode::BAD_REQUEST)
            .json_into();

        assert_eq!(error.get_type(), "docstore:ValidationError");
        assert!(app.storage().list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn create_rejects_non_multipart_bodies() {
        let app = TestAppBuilder::default_app();

        let request = app
            .post("/documents")
            .json(&json!({ "content": "hello" }));
        let error: InternalError = app
            .fetch(request)
            .await
            .assert_status(StatusCode::BAD_REQUEST)
            .json_into();

        assert_eq!(error.get_type(), "docstore:ValidationError");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn update_creates_missing_document() {
        let app = TestAppBuilder::default_app();

        let request = app.put("/documents/my-notes").multipart(text_form("first"));
        let document: Document = app
            .fetch(request)
            .await
            .assert_status(StatusCode::OK)
            .json_into();
        assert_eq!(document.id, "my-notes");

        let request = app.put("/documents/my-notes").multipart(text_form("second"));
        app.fetch(request).await.assert_status(StatusCode::OK);

        let request = app.get("/documents/my-notes");
        let document: Document = app
            .fetch(request)
            .await
            .assert_status(StatusCode::OK)
            .json_into();
        assert_eq!(document.content, "second");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn update_attaches_files() {
        let app = TestAppBuilder::default_app();
        let document = create(&app, text_form("hello")).await;

        let request = app
            .put(&format!("/documents/{}", document.id))
            .multipart(form_with_file("hello again", "notes.md", b"# notes"));
        let updated: Document = app
            .fetch(request)
            .await
            .assert_status(StatusCode::OK)
            .json_into();

        assert_eq!(updated.id, document.id);
        assert_eq!(
            updated.file_id,
            Some(format!("{}_notes.md", document.id))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn update_rejects_ids_with_separator() {
        let app = TestAppBuilder::default_app();

        let request = app.put("/documents/a_b").multipart(text_form("hello"));
        let error: InternalError = app
            .fetch(request)
            .await
            .assert_status(StatusCode::BAD_REQUEST)
            .json_into();

        assert_eq!(error.get_type(), "docstore:ValidationError");
        assert!(app.storage().list().await.unwrap().is_empty());
    }

    #[rstest]
    #[case::get("/documents/missing")]
    #[case::download("/documents/download/missing")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn missing_documents_are_not_found(#[case] path: &str) {
        let app = TestAppBuilder::default_app();

        let request = app.get(path);
        let error: InternalError = app
            .fetch(request)
            .await
            .assert_status(StatusCode::NOT_FOUND)
            .json_into();

        assert_eq!(error.get_type(), "docstore:NotFoundError");
        assert_eq!(error.context["key"], json!("missing"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn delete_missing_document_is_not_found() {
        let app = TestAppBuilder::default_app();

        let request = app.delete("/documents/missing");
        app.fetch(request)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn delete_removes_attached_files() {
        let app = TestAppBuilder::default_app();
        let document = create(&app, form_with_file("hello", "f.txt", b"data")).await;

        let request = app.delete(&format!("/documents/{}", document.id));
        app.fetch(request).await.assert_status(StatusCode::OK);

        let request = app.get("/documents");
        let listed: Vec<Document> = app
            .fetch(request)
            .await
            .assert_status(StatusCode::OK)
            .json_into();
        assert!(listed.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn list_truncates_descriptions() {
        let app = TestAppBuilder::default_app();
        let content = "0123456789".repeat(4);
        create(&app, text_form(&content)).await;

        let request = app.get("/documents");
        let listed: Vec<Document> = app
            .fetch(request)
            .await
            .assert_status(StatusCode::OK)
            .json_into();

        assert_eq!(listed.len(), 1);
        let description = listed[0].description.clone().unwrap();
        assert_eq!(description.chars().count(), 33);
        assert_eq!(description, format!("{}...", &content[..30]));
        assert_eq!(listed[0].content, content);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn storage_failures_are_internal_errors() {
        let storage = storage::Client::for_tests().reject_writes_ending_with(".pdf");
        let app = TestAppBuilder::new().storage(storage).build();

        let request = app
            .post("/documents")
            .multipart(form_with_file("hello", "report.pdf", b"%PDF"));
        let error: InternalError = app
            .fetch(request)
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
            .json_into();

        assert_eq!(error.get_type(), "docstore:StorageIOError");
        assert!(app.storage().list().await.unwrap().is_empty());
    }
}
