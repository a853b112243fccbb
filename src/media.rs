use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::configuration::MediaSettings;
use crate::error::MediaError;

/// Reference to a file hosted by the media service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub url: String,
}

/// Pushes a locally staged file to the media host
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, local_path: &str) -> Result<UploadedMedia, MediaError>;
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

#[derive(Clone)]
pub struct HttpMediaStore {
    http_client: reqwest::Client,
    upload_url: String,
    upload_preset: String,
    staging_dir: PathBuf,
}

impl HttpMediaStore {
    pub fn new(settings: &MediaSettings) -> Result<Self, MediaError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| MediaError::UploadFailed(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            upload_url: settings.upload_url.clone(),
            upload_preset: settings.upload_preset.clone(),
            staging_dir: PathBuf::from(&settings.staging_dir),
        })
    }

    /// Resolves `local_path` and checks that it names a regular file inside
    /// the staging directory. Symlinks and `..` segments are resolved first.
    async fn staged_file(&self, local_path: &str) -> Result<PathBuf, MediaError> {
        let staging_dir = tokio::fs::canonicalize(&self.staging_dir)
            .await
            .map_err(|_| MediaError::FileMissing(self.staging_dir.display().to_string()))?;
        let path = tokio::fs::canonicalize(local_path)
            .await
            .map_err(|_| MediaError::FileMissing(local_path.to_string()))?;

        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if path.parent() != Some(staging_dir.as_path()) || !is_file {
            return Err(MediaError::OutsideStagingArea(local_path.to_string()));
        }
        Ok(path)
    }

    async fn send(&self, path: &Path) -> Result<UploadedMedia, MediaError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|_| MediaError::FileMissing(path.display().to_string()))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name))
            .text("upload_preset", self.upload_preset.clone());

        let response = self
            .http_client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to reach media host: {}", e);
                MediaError::UploadFailed(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("Media host returned error: {}", e);
                MediaError::UploadFailed(e.to_string())
            })?;

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| MediaError::InvalidResponse(e.to_string()))?;

        body.secure_url
            .or(body.url)
            .filter(|u| !u.is_empty())
            .map(|url| UploadedMedia { url })
            .ok_or_else(|| MediaError::InvalidResponse("missing url".to_string()))
    }
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn upload(&self, local_path: &str) -> Result<UploadedMedia, MediaError> {
        if local_path.trim().is_empty() {
            return Err(MediaError::FileMissing(local_path.to_string()));
        }

        let path = self.staged_file(local_path).await.map_err(|e| {
            tracing::warn!(path = local_path, error = %e, "Rejected upload source");
            e
        })?;

        let result = self.send(&path).await;

        // The staged copy is discarded whether or not the upload went through
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = local_path, "Failed to remove staged file: {}", e);
            }
        }

        if let Ok(media) = &result {
            tracing::info!(url = %media.url, "Uploaded media");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn staging_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("videotube-staging-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        dir
    }

    fn store(staging_dir: &Path) -> HttpMediaStore {
        HttpMediaStore::new(&MediaSettings {
            upload_url: "http://127.0.0.1:9/upload".to_string(),
            upload_preset: "test".to_string(),
            timeout_seconds: 1,
            staging_dir: staging_dir.to_string_lossy().to_string(),
            max_upload_bytes: 1024,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let dir = staging_dir().await;
        let missing = dir.join("not-here.png");
        let err = store(&dir)
            .upload(&missing.to_string_lossy())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileMissing(_)));
    }

    #[tokio::test]
    async fn test_blank_path_fails() {
        let dir = staging_dir().await;
        let err = store(&dir).upload("  ").await.unwrap_err();
        assert!(matches!(err, MediaError::FileMissing(_)));
    }

    #[tokio::test]
    async fn test_staged_file_removed_after_failed_upload() {
        let dir = staging_dir().await;
        let path = dir.join(format!("{}.png", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"not really a png").await.unwrap();

        let result = store(&dir).upload(&path.to_string_lossy()).await;

        assert!(matches!(result, Err(MediaError::UploadFailed(_))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_outside_staging_dir_is_refused_and_kept() {
        let dir = staging_dir().await;
        let outside = std::env::temp_dir().join(format!("videotube-keep-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&outside, b"server file").await.unwrap();

        let err = store(&dir)
            .upload(&outside.to_string_lossy())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::OutsideStagingArea(_)));
        assert!(outside.exists());

        let escaped = format!("{}/../{}", dir.display(), outside.file_name().unwrap().to_string_lossy());
        let err = store(&dir).upload(&escaped).await.unwrap_err();
        assert!(matches!(err, MediaError::OutsideStagingArea(_)));
        assert!(outside.exists());

        tokio::fs::remove_file(&outside).await.unwrap();
    }

    #[tokio::test]
    async fn test_staging_dir_itself_is_refused() {
        let dir = staging_dir().await;
        let err = store(&dir).upload(&dir.to_string_lossy()).await.unwrap_err();
        assert!(matches!(err, MediaError::OutsideStagingArea(_)));
        assert!(dir.exists());
    }
}
