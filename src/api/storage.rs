//! File attachment endpoints.
//!
//! Uploads are multipart. The file part is streamed to a temp file while the
//! text parts are collected, then the whole form is validated before the file
//! is moved into the owner's directory. Any rejection drops the temp file.

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{self, FileKind, NewStoredFile, StoredFile, User};
use crate::storage::{
    file_extension, resolve_mime_type, sanitize_file_name, PendingUpload, StorageError,
};
use crate::AppState;

use super::error::{ApiError, DbResultExt};
use super::extract::QueryParams;

/// Multipart field names accepted for the file itself
const FILE_FIELDS: [&str; 3] = ["file", "upload", "document"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageListQuery {
    pub kind: Option<String>,
    pub invoice_id: Option<String>,
    pub request_id: Option<String>,
}

fn parse_kind(value: Option<&str>) -> Result<FileKind, ApiError> {
    value
        .and_then(|k| k.parse::<FileKind>().ok())
        .ok_or_else(|| ApiError::bad_request("Invalid kind"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    user: User,
    QueryParams(query): QueryParams<StorageListQuery>,
) -> Result<Json<Vec<StoredFile>>, ApiError> {
    let Some(kind) = query.kind.as_deref() else {
        return Err(ApiError::bad_request("kind is required"));
    };
    let kind = parse_kind(Some(kind))?;

    let files = db::list_stored_files(
        &state.db,
        &user.id,
        kind,
        query.invoice_id.as_deref(),
        query.request_id.as_deref(),
    )
    .await
    .db_context("list_files", &user.id)?;
    Ok(Json(files))
}

/// The file part of an upload, already on disk
struct ReceivedFile {
    upload: PendingUpload,
    original_name: String,
    mime_type: String,
}

#[derive(Default)]
struct UploadForm {
    kind: Option<String>,
    invoice_id: Option<String>,
    request_id: Option<String>,
    file: Option<ReceivedFile>,
}

fn storage_error(err: StorageError) -> ApiError {
    match err {
        StorageError::TooLarge(limit) => {
            ApiError::payload_too_large(format!("File exceeds maximum size of {} bytes", limit))
        }
        other => {
            tracing::error!("Upload storage failed: {}", other);
            ApiError::internal("Upload failed")
        }
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload exceeds the maximum allowed size")
    } else {
        tracing::debug!("Rejected multipart body: {}", err.body_text());
        ApiError::bad_request("Invalid multipart body")
    }
}

async fn receive_file(state: &AppState, mut field: Field<'_>) -> Result<ReceivedFile, ApiError> {
    let original_name = sanitize_file_name(field.file_name().unwrap_or_default());
    let mime_type = resolve_mime_type(field.content_type(), &original_name);

    let mut upload = state.storage.begin_upload().await.map_err(storage_error)?;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        upload.write(&chunk).await.map_err(storage_error)?;
    }

    Ok(ReceivedFile {
        upload,
        original_name,
        mime_type,
    })
}

async fn read_form(state: &AppState, mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "kind" => form.kind = Some(field.text().await.map_err(multipart_error)?),
            "invoiceId" => form.invoice_id = Some(field.text().await.map_err(multipart_error)?),
            "requestId" => form.request_id = Some(field.text().await.map_err(multipart_error)?),
            n if FILE_FIELDS.contains(&n) && form.file.is_none() => {
                form.file = Some(receive_file(state, field).await?);
            }
            _ => {}
        }
    }

    Ok(form)
}

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    user: User,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StoredFile>), ApiError> {
    let form = read_form(&state, multipart).await?;

    let kind = parse_kind(form.kind.as_deref())?;
    let invoice_id = non_empty(form.invoice_id);
    let request_id = non_empty(form.request_id);

    if invoice_id.is_some() && !kind.accepts_invoice_link() {
        return Err(ApiError::bad_request("invoiceId only allowed for INVOICE kind"));
    }
    if request_id.is_some() && !kind.accepts_request_link() {
        return Err(ApiError::bad_request("requestId only allowed for REQUEST kind"));
    }

    let Some(received) = form.file else {
        return Err(ApiError::bad_request("file is required"));
    };

    // Attachments only ever link to the uploader's own records
    if let Some(invoice_id) = invoice_id.as_deref() {
        if !db::invoice_owned_by(&state.db, &user.id, invoice_id).await? {
            return Err(ApiError::not_found("Invoice not found"));
        }
    }
    if let Some(request_id) = request_id.as_deref() {
        if !db::request_owned_by(&state.db, &user.id, request_id).await? {
            return Err(ApiError::not_found("Request not found"));
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    let file_name = format!("{}{}", id, file_extension(&received.original_name));
    let size_bytes = received.upload.size() as i64;

    let storage_path = received
        .upload
        .persist(&state.storage, &user.id, &file_name)
        .await
        .map_err(storage_error)?;

    let stored = db::insert_stored_file(
        &state.db,
        &user.id,
        &NewStoredFile {
            id: &id,
            kind,
            original_name: &received.original_name,
            file_name: &file_name,
            mime_type: &received.mime_type,
            size_bytes,
            storage_path: &storage_path,
            invoice_id: invoice_id.as_deref(),
            request_id: request_id.as_deref(),
        },
    )
    .await
    .db_context("record_upload", &id)?;

    tracing::info!(
        file_id = %stored.id,
        user_id = %user.id,
        kind = %stored.kind,
        size_bytes = stored.size_bytes,
        "File uploaded"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}
