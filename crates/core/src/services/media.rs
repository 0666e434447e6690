//! Media adapter: validates and stores uploaded poll files.

use pollhub_common::{AppError, AppResult, StorageService, generate_storage_key};
use pollhub_db::entities::poll_choice::MediaType;
use serde::Serialize;

/// MIME types accepted for poll media.
pub const ALLOWED_MIME_TYPES: [&str; 7] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/webm",
    "application/pdf",
];

/// Default per-file size limit.
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// A file received from a client, before it is stored.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Outcome of [`MediaService::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileValidation {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl FileValidation {
    const fn ok() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(message.into()),
        }
    }
}

/// A file written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// Storage key; pass it back to [`MediaService::delete`].
    pub file_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    pub url: String,
    pub media_type: MediaType,
}

/// Validates, stores and removes uploaded files.
#[derive(Clone)]
pub struct MediaService {
    storage: StorageService,
    max_file_size: usize,
    max_files_per_request: usize,
}

impl MediaService {
    /// Create a new media service.
    #[must_use]
    pub fn new(
        storage: StorageService,
        max_file_size: usize,
        max_files_per_request: usize,
    ) -> Self {
        Self {
            storage,
            max_file_size,
            max_files_per_request,
        }
    }

    /// Check size and type without touching storage.
    #[must_use]
    pub fn validate(&self, file: &UploadedFile) -> FileValidation {
        if file.data.is_empty() {
            return FileValidation::fail("File is empty");
        }
        if file.data.len() > self.max_file_size {
            return FileValidation::fail(format!(
                "File size exceeds the maximum of {} MB",
                self.max_file_size / (1024 * 1024)
            ));
        }
        let mime = file.content_type.to_ascii_lowercase();
        if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
            return FileValidation::fail(format!("File type {} is not allowed", file.content_type));
        }
        FileValidation::ok()
    }

    /// Like [`Self::validate`], as a `Validation` error.
    pub fn ensure_valid(&self, file: &UploadedFile) -> AppResult<()> {
        match self.validate(file) {
            FileValidation {
                is_valid: false,
                error,
            } => Err(AppError::Validation(
                error.unwrap_or_else(|| "Invalid file".to_string()),
            )),
            _ => Ok(()),
        }
    }

    /// Validate and store one file under `owner_id`'s namespace.
    pub async fn upload(&self, owner_id: &str, file: UploadedFile) -> AppResult<StoredFile> {
        self.ensure_valid(&file)?;
        self.store(owner_id, file).await
    }

    /// Validate every file, then store them in order.
    ///
    /// Nothing is written when any file is invalid. When a write fails, files
    /// already written by this call are removed.
    pub async fn upload_many(
        &self,
        owner_id: &str,
        files: Vec<UploadedFile>,
    ) -> AppResult<Vec<StoredFile>> {
        if files.len() > self.max_files_per_request {
            return Err(AppError::Validation(format!(
                "Too many files. Maximum is {}",
                self.max_files_per_request
            )));
        }
        for file in &files {
            self.ensure_valid(file)?;
        }

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            match self.store(owner_id, file).await {
                Ok(s) => stored.push(s),
                Err(e) => {
                    let keys: Vec<&str> = stored.iter().map(|s| s.file_name.as_str()).collect();
                    self.delete_all(keys).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    /// Remove a stored file. Failures are logged, never returned.
    pub async fn delete(&self, file_name: &str) {
        if let Err(e) = self.storage.delete(file_name).await {
            tracing::warn!(key = %file_name, error = %e, "Failed to delete media file");
        }
    }

    /// Remove several stored files, best effort.
    pub async fn delete_all<'a>(&self, file_names: impl IntoIterator<Item = &'a str>) {
        for name in file_names {
            self.delete(name).await;
        }
    }

    async fn store(&self, owner_id: &str, file: UploadedFile) -> AppResult<StoredFile> {
        let key = generate_storage_key(owner_id, &file.original_name);
        let mime = file.content_type.to_ascii_lowercase();
        let object = self.storage.upload(&key, &file.data, &mime).await?;

        Ok(StoredFile {
            file_name: object.key,
            original_name: file.original_name,
            media_type: MediaType::from_mime(&mime),
            mime_type: mime,
            size: object.size,
            url: object.url,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use pollhub_common::{AppError, AppResult, StorageBackend, StoredObject};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory storage that can be told to fail the n-th upload.
    #[derive(Default)]
    pub struct MemoryStorage {
        pub files: Mutex<HashMap<String, Vec<u8>>>,
        pub fail_upload_at: Option<usize>,
        uploads: AtomicUsize,
    }

    impl MemoryStorage {
        pub fn failing_at(n: usize) -> Self {
            Self {
                fail_upload_at: Some(n),
                ..Self::default()
            }
        }

        pub fn len(&self) -> usize {
            self.files.lock().map(|f| f.len()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl StorageBackend for MemoryStorage {
        async fn upload(
            &self,
            key: &str,
            data: &[u8],
            content_type: &str,
        ) -> AppResult<StoredObject> {
            let n = self.uploads.fetch_add(1, Ordering::SeqCst);
            if self.fail_upload_at == Some(n) {
                return Err(AppError::Storage("disk full".to_string()));
            }
            if let Ok(mut files) = self.files.lock() {
                files.insert(key.to_string(), data.to_vec());
            }
            Ok(StoredObject {
                key: key.to_string(),
                url: self.public_url(key),
                size: data.len() as u64,
                content_type: content_type.to_string(),
            })
        }

        async fn delete(&self, key: &str) -> AppResult<()> {
            if let Ok(mut files) = self.files.lock() {
                files.remove(key);
            }
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("http://localhost:3000/uploads/{key}")
        }

        async fn exists(&self, key: &str) -> AppResult<bool> {
            Ok(self.files.lock().is_ok_and(|f| f.contains_key(key)))
        }
    }

    pub fn png(name: &str) -> super::UploadedFile {
        super::UploadedFile {
            original_name: name.to_string(),
            content_type: "image/png".to_string(),
            data: vec![0x89, b'P', b'N', b'G'],
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::testing::{MemoryStorage, png};
    use super::*;
    use pollhub_common::StorageBackend;
    use std::sync::Arc;

    fn service(storage: Arc<MemoryStorage>) -> MediaService {
        MediaService::new(storage, DEFAULT_MAX_FILE_SIZE, 3)
    }

    #[test]
    fn test_validate() {
        let service = service(Arc::new(MemoryStorage::default()));
        assert!(service.validate(&png("a.png")).is_valid);

        let mut exe = png("a.exe");
        exe.content_type = "application/x-msdownload".to_string();
        let result = service.validate(&exe);
        assert!(!result.is_valid);
        assert!(result.error.unwrap().contains("not allowed"));

        let mut big = png("big.png");
        big.data = vec![0; DEFAULT_MAX_FILE_SIZE + 1];
        assert!(!service.validate(&big).is_valid);

        let mut empty = png("empty.png");
        empty.data.clear();
        assert!(!service.validate(&empty).is_valid);
    }

    #[tokio::test]
    async fn test_upload() {
        let storage = Arc::new(MemoryStorage::default());
        let service = service(storage.clone());

        let stored = service.upload("u1", png("cat.png")).await.unwrap();
        assert_eq!(stored.original_name, "cat.png");
        assert_eq!(stored.media_type, MediaType::Image);
        assert_eq!(stored.size, 4);
        assert!(stored.file_name.ends_with(".png"));
        assert!(storage.exists(&stored.file_name).await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_many_validates_before_writing() {
        let storage = Arc::new(MemoryStorage::default());
        let service = service(storage.clone());

        let mut bad = png("doc.txt");
        bad.content_type = "text/plain".to_string();

        let result = service.upload_many("u1", vec![png("a.png"), bad]).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(storage.len(), 0);
    }

    #[tokio::test]
    async fn test_upload_many_rolls_back_on_write_failure() {
        let storage = Arc::new(MemoryStorage::failing_at(1));
        let service = service(storage.clone());

        let result = service
            .upload_many("u1", vec![png("a.png"), png("b.png")])
            .await;
        assert!(matches!(result, Err(AppError::Storage(_))));
        assert_eq!(storage.len(), 0);
    }

    #[tokio::test]
    async fn test_upload_many_limit() {
        let service = service(Arc::new(MemoryStorage::default()));
        let files = vec![png("a.png"), png("b.png"), png("c.png"), png("d.png")];
        assert!(matches!(
            service.upload_many("u1", files).await,
            Err(AppError::Validation(_))
        ));
    }
}
