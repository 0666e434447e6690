//! Multipart form parsing for uploads.

use std::collections::HashMap;

use axum::extract::Multipart;
use pollhub_common::{AppError, AppResult};
use pollhub_core::UploadedFile;

/// Text fields and files of a multipart body.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl FormData {
    /// Non-empty text field.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// First uploaded file, if any.
    pub fn into_single_file(self) -> AppResult<UploadedFile> {
        self.files
            .into_iter()
            .next()
            .ok_or_else(|| AppError::BadRequest("No file provided".to_string()))
    }
}

/// Read every part. Parts with a file name are files; the rest are text fields.
pub async fn read_form(mut multipart: Multipart) -> AppResult<FormData> {
    let mut form = FormData::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        if let Some(file_name) = field.file_name().map(ToString::to_string) {
            let content_type = field
                .content_type()
                .map_or_else(|| "application/octet-stream".to_string(), ToString::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?
                .to_vec();

            form.files.push(UploadedFile {
                original_name: file_name,
                content_type,
                data,
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            form.fields.insert(name, text);
        }
    }

    Ok(form)
}
