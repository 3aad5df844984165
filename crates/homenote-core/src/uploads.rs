//! Presigned file uploads
//!
//! 1. `POST /v1/file-assets/presigned-urls` reserves an asset and returns
//!    an object-storage URL
//! 2. the raw bytes are `PUT` to that URL without the bearer token
//! 3. `POST /v1/file-assets/{id}/complete` reports the probed metadata

use crate::error::{ServiceError, ServiceResult};
use crate::media::{probe_metadata, MediaKind};
use crate::models::{FileAsset, PresignedUrl, PresignedUrlRequest};
use homenote_client::{endpoints, ApiClient, ApiEnvelope, HttpRequest, Method, RequestOptions};
use std::path::Path;

/// File ready to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub kind: MediaKind,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Build from bytes, detecting the kind from content then name
    ///
    /// # Errors
    /// - `ServiceError::Validation` for empty or unsupported files
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> ServiceResult<Self> {
        let file_name = file_name.into();
        if bytes.is_empty() {
            return Err(ServiceError::Validation(format!("{file_name} is empty")));
        }

        let kind = MediaKind::sniff(&bytes)
            .or_else(|| MediaKind::from_path(Path::new(&file_name)))
            .ok_or_else(|| {
                ServiceError::Validation(format!(
                    "{file_name}: only PNG, JPEG, GIF and PDF files can be uploaded"
                ))
            })?;

        Ok(Self {
            file_name,
            kind,
            bytes,
        })
    }

    /// Read a file from disk
    ///
    /// # Errors
    /// - `ServiceError::Validation` if the file cannot be read or is unsupported
    pub async fn read(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ServiceError::Validation(format!("{}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self::new(file_name, bytes)
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Uploads files through presigned URLs
#[derive(Debug, Clone)]
pub struct UploadService {
    client: ApiClient,
}

impl UploadService {
    #[inline]
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Upload one file and register it with the backend
    ///
    /// # Errors
    /// - `ServiceError::Client` if reserving or completing the asset fails
    /// - `ServiceError::Upload` if object storage refuses the bytes
    pub async fn upload(&self, file: &UploadFile) -> ServiceResult<FileAsset> {
        let request = PresignedUrlRequest {
            file_name: file.file_name.clone(),
            content_type: file.kind.content_type().to_string(),
            file_size: file.size(),
        };
        let target: PresignedUrl = self
            .client
            .post_data(endpoints::PRESIGNED_URLS, &request)
            .await?;
        tracing::debug!("Uploading {} as asset {}", file.file_name, target.file_asset_id);

        self.put_object(&target.upload_url, file).await?;

        let metadata = probe_metadata(file.kind, &file.bytes);
        let complete = format!("{}/{}/complete", endpoints::FILE_ASSETS, target.file_asset_id);
        let envelope: ApiEnvelope<FileAsset> = self
            .client
            .request(&complete, RequestOptions::post().with_json(&metadata)?)
            .await?;

        tracing::info!("Uploaded {} ({} bytes)", file.file_name, file.size());
        Ok(envelope.data.unwrap_or_else(|| FileAsset {
            id: target.file_asset_id,
            url: None,
            file_name: Some(file.file_name.clone()),
        }))
    }

    /// Upload several files in order, stopping at the first failure
    ///
    /// # Errors
    /// Same as [`UploadService::upload`].
    pub async fn upload_all(&self, files: &[UploadFile]) -> ServiceResult<Vec<FileAsset>> {
        let mut assets = Vec::with_capacity(files.len());
        for file in files {
            assets.push(self.upload(file).await?);
        }
        Ok(assets)
    }

    async fn put_object(&self, url: &str, file: &UploadFile) -> ServiceResult<()> {
        let request = HttpRequest::new(Method::Put, url)
            .header("Content-Type", file.kind.content_type())
            .body(file.bytes.clone());

        let response = self
            .client
            .transport()
            .send(request)
            .await
            .map_err(|e| ServiceError::Upload(e.to_string()))?;

        if response.is_success() {
            Ok(())
        } else {
            Err(ServiceError::Upload(format!(
                "object storage answered HTTP {} for {}",
                response.status, file.file_name
            )))
        }
    }
}
