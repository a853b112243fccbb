/// Multipart intake
///
/// File parts are written into the staging directory under server-generated
/// names and text parts are collected as strings. Paths produced here are the
/// only ones handed to `MediaStore::upload`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use actix_multipart::{Field, Multipart};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::configuration::MediaSettings;
use crate::error::AppError;

const MAX_TEXT_FIELD_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
    max_file_bytes: usize,
}

/// Parsed multipart body. Call `discard` once the request is done with it.
#[derive(Debug, Default)]
pub struct StagedForm {
    fields: HashMap<String, String>,
    files: HashMap<String, PathBuf>,
}

impl StagedForm {
    /// Text value of `name`, empty when absent
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Staged path of the file part `name`
    pub fn file(&self, name: &str) -> Option<String> {
        self.files
            .get(name)
            .map(|path| path.to_string_lossy().to_string())
    }

    /// Removes every staged file that the media store has not consumed
    pub async fn discard(&mut self) {
        for (_, path) in self.files.drain() {
            remove_quietly(&path).await;
        }
    }
}

impl StagingArea {
    pub fn new(settings: &MediaSettings) -> Self {
        Self {
            dir: PathBuf::from(&settings.staging_dir),
            max_file_bytes: settings.max_upload_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads the whole body. Parts named in `file_fields` that carry a
    /// filename are staged to disk; every other part is read as text.
    pub async fn receive(
        &self,
        payload: Multipart,
        file_fields: &[&str],
    ) -> Result<StagedForm, AppError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            AppError::Internal(format!("Failed to prepare staging directory: {}", e))
        })?;

        let mut form = StagedForm::default();
        if let Err(e) = self.collect(payload, file_fields, &mut form).await {
            form.discard().await;
            return Err(e);
        }
        Ok(form)
    }

    async fn collect(
        &self,
        mut payload: Multipart,
        file_fields: &[&str],
        form: &mut StagedForm,
    ) -> Result<(), AppError> {
        while let Some(item) = payload.next().await {
            let mut field =
                item.map_err(|e| AppError::invalid(format!("Malformed multipart body: {}", e)))?;

            let disposition = field.content_disposition();
            let name = disposition.get_name().unwrap_or_default().to_string();
            let file_name = disposition.get_filename().map(str::to_string);

            match file_name {
                Some(file_name) if file_fields.contains(&name.as_str()) => {
                    let path = self.stage_file(&mut field, &file_name).await?;
                    if let Some(previous) = form.files.insert(name, path) {
                        remove_quietly(&previous).await;
                    }
                }
                _ => {
                    let value = read_text(&mut field).await?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(())
    }

    async fn stage_file(&self, field: &mut Field, file_name: &str) -> Result<PathBuf, AppError> {
        let path = self
            .dir
            .join(format!("{}{}", Uuid::new_v4(), extension_of(file_name)));

        let result = self.write_part(field, &path).await;
        if result.is_err() {
            remove_quietly(&path).await;
        }
        result.map(|_| path)
    }

    async fn write_part(&self, field: &mut Field, path: &Path) -> Result<(), AppError> {
        let io_error = |e: std::io::Error| AppError::Internal(format!("Failed to stage upload: {}", e));

        let mut file = tokio::fs::File::create(path).await.map_err(io_error)?;
        let mut written = 0usize;
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::invalid(format!("Malformed multipart body: {}", e)))?;
            written += chunk.len();
            if written > self.max_file_bytes {
                return Err(AppError::invalid(format!(
                    "File exceeds the {} byte limit",
                    self.max_file_bytes
                )));
            }
            file.write_all(&chunk).await.map_err(io_error)?;
        }
        file.flush().await.map_err(io_error)?;
        Ok(())
    }
}

async fn read_text(field: &mut Field) -> Result<String, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk =
            chunk.map_err(|e| AppError::invalid(format!("Malformed multipart body: {}", e)))?;
        if bytes.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(AppError::invalid("Form field is too large"));
        }
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8(bytes).map_err(|_| AppError::invalid("Form field is not valid UTF-8"))
}

/// Keeps a short alphanumeric extension from the client's filename; the rest
/// of the name is discarded
fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), "Failed to remove staged file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_sanitized() {
        assert_eq!(extension_of("avatar.PNG"), ".png");
        assert_eq!(extension_of("../../etc/passwd"), "");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("evil.p/ng"), "");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of("weird.ext-with-dash"), "");
    }

    #[tokio::test]
    async fn test_discard_removes_staged_files() {
        let dir = std::env::temp_dir().join(format!("videotube-staging-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let staged = dir.join("staged.png");
        tokio::fs::write(&staged, b"bytes").await.unwrap();

        let mut form = StagedForm::default();
        form.files.insert("avatar".to_string(), staged.clone());
        assert_eq!(form.file("avatar"), Some(staged.to_string_lossy().to_string()));
        assert_eq!(form.text("fullName"), "");

        form.discard().await;
        assert!(!staged.exists());
        assert!(form.file("avatar").is_none());
    }
}
