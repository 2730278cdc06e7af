use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::{routing::post, Json, Router};
use validator::Validate;

use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{file_kind_for_name, normalize_tags, MediaRecord, UploadResponse};
use crate::pinning::{PinMetadata, PinUpload};

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[derive(Debug, Default, Validate)]
struct UploadFields {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    name: String,
    #[validate(length(max = 2000, message = "description too long"))]
    description: String,
    tags: String,
    #[validate(length(max = 100, message = "category too long"))]
    category: String,
    #[validate(length(max = 200, message = "location too long"))]
    location: String,
    #[validate(length(max = 200, message = "artist too long"))]
    artist: String,
    visible: bool,
}

struct UploadFile {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

fn is_supported_upload(file_name: &str, content_type: &str) -> bool {
    let declared = if content_type.is_empty() {
        mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string()
    } else {
        content_type.to_string()
    };

    declared.starts_with("image/") || declared == "application/pdf"
}

async fn collect_multipart(
    multipart: &mut Multipart,
) -> AppResult<(Option<UploadFile>, UploadFields)> {
    let mut file = None;
    let mut fields = UploadFields {
        visible: true,
        ..UploadFields::default()
    };

    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = part.name().unwrap_or_default().to_string();

        if name == "file" {
            let file_name = part.file_name().unwrap_or_default().to_string();
            let content_type = part.content_type().unwrap_or_default().to_string();
            let bytes = part
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?
                .to_vec();

            file = Some(UploadFile {
                file_name,
                content_type,
                bytes,
            });
            continue;
        }

        let value = part
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read field {}: {}", name, e)))?;

        match name.as_str() {
            "name" => fields.name = value.trim().to_string(),
            "description" => fields.description = value.trim().to_string(),
            "tags" => fields.tags = value,
            "category" => fields.category = value.trim().to_string(),
            "location" => fields.location = value.trim().to_string(),
            "artist" => fields.artist = value.trim().to_string(),
            "visibility" => {
                fields.visible =
                    crate::models::normalize_visibility(&serde_json::Value::String(value))
            }
            _ => {}
        }
    }

    Ok((file, fields))
}

async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let (file, mut fields) = collect_multipart(&mut multipart).await?;

    let file = file.ok_or_else(|| AppError::Validation("No file provided".to_string()))?;

    if file.file_name.is_empty() {
        return Err(AppError::Validation("File has no name".to_string()));
    }

    if !is_supported_upload(&file.file_name, &file.content_type) {
        return Err(AppError::Validation(
            "Only image and PDF files are accepted".to_string(),
        ));
    }

    if fields.name.is_empty() {
        fields.name = file.file_name.clone();
    }

    fields
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let tags = normalize_tags(&serde_json::Value::String(fields.tags.clone()));

    let metadata = PinMetadata {
        name: fields.name.clone(),
        description: fields.description.clone(),
        tags: tags.clone(),
        category: fields.category.clone(),
        location: fields.location.clone(),
        artist: fields.artist.clone(),
        visible: fields.visible,
    };

    let file_kind = file_kind_for_name(&file.file_name);
    let content_type = if file.content_type.is_empty() {
        mime_guess::from_path(&file.file_name)
            .first_or_octet_stream()
            .to_string()
    } else {
        file.content_type.clone()
    };

    let receipt = state
        .store
        .pin_file(PinUpload {
            file_name: file.file_name,
            content_type,
            bytes: file.bytes,
            metadata,
        })
        .await?;

    let gateway_url = format!(
        "{}/{}",
        state.config.pinning.gateway_url.trim_end_matches('/'),
        receipt.ipfs_hash
    );

    let record = MediaRecord {
        content_hash: receipt.ipfs_hash.clone(),
        display_name: fields.name,
        size_bytes: receipt.pin_size,
        pinned_at: receipt.timestamp,
        description: fields.description,
        tags,
        category: fields.category,
        location: fields.location,
        artist: fields.artist,
        visible: fields.visible,
        file_kind,
        thumbnail: None,
        total_downloads: 0,
        unique_downloads: 0,
    };

    Ok(Json(UploadResponse {
        success: true,
        ipfs_hash: receipt.ipfs_hash,
        pin_size: receipt.pin_size,
        timestamp: receipt.timestamp,
        gateway_url,
        metadata: record,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_app;
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use serde_json::Value;

    #[test]
    fn test_supported_upload_types() {
        assert!(is_supported_upload("flyer.png", "image/png"));
        assert!(is_supported_upload("scan.pdf", "application/pdf"));
        // Falls back to a filename guess when no content type was declared
        assert!(is_supported_upload("photo.jpg", ""));
        assert!(!is_supported_upload("notes.txt", "text/plain"));
        assert!(!is_supported_upload("archive.zip", ""));
    }

    #[tokio::test]
    async fn test_upload_without_file_is_rejected() {
        let (app, _pool) = create_test_app(Vec::new());
        let server = TestServer::new(app).unwrap();

        let form = MultipartForm::new().add_text("name", "no file here");
        let response = server.post("/api/upload").multipart(form).await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_type() {
        let (app, _pool) = create_test_app(Vec::new());
        let server = TestServer::new(app).unwrap();

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"plain text".to_vec())
                .file_name("notes.txt")
                .mime_type("text/plain"),
        );
        let response = server.post("/api/upload").multipart(form).await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_pins_and_reports_receipt() {
        let (app, _pool) = create_test_app(Vec::new());
        let server = TestServer::new(app).unwrap();

        let form = MultipartForm::new()
            .add_text("name", "March flyer")
            .add_text("tags", "poster, street")
            .add_text("location", "Beirut")
            .add_part(
                "file",
                Part::bytes(b"fake png bytes".to_vec())
                    .file_name("flyer.png")
                    .mime_type("image/png"),
            );

        let response = server.post("/api/upload").multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert!(body["ipfsHash"].as_str().unwrap().len() > 0);
        assert_eq!(body["metadata"]["displayName"], "March flyer");
        assert_eq!(body["metadata"]["tags"], serde_json::json!(["poster", "street"]));
        assert_eq!(body["metadata"]["fileKind"], "image");
        assert!(body["gatewayUrl"]
            .as_str()
            .unwrap()
            .ends_with(body["ipfsHash"].as_str().unwrap()));
    }
}
