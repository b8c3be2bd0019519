//! File system exporter
//!
//! Writes a saved clip into the output directory. An existing file is never
//! overwritten: `recording.wav` becomes `recording (1).wav`, and so on.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::application::ports::{ArtifactExporter, ExportError, ExportRequest};

/// Upper bound on numbered variants tried for one file name
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Exporter writing into a directory
#[derive(Debug, Clone)]
pub struct FileExporter {
    dir: PathBuf,
}

impl FileExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write_failed(path: &Path, e: impl std::fmt::Display) -> ExportError {
        ExportError::WriteFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    }
}

/// `name`, then `stem (1).ext`, `stem (2).ext`, ...
fn candidate_name(file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, attempt, ext),
        _ => format!("{} ({})", file_name, attempt),
    }
}

#[async_trait]
impl ArtifactExporter for FileExporter {
    async fn export(&self, request: ExportRequest<'_>) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ExportError::DirectoryUnavailable(format!("{}: {}", self.dir.display(), e)))?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self.dir.join(candidate_name(request.file_name, attempt));

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(Self::write_failed(&path, e)),
            };

            file.write_all(request.audio.data())
                .await
                .map_err(|e| Self::write_failed(&path, e))?;
            file.flush().await.map_err(|e| Self::write_failed(&path, e))?;

            debug!(
                reference = %request.reference,
                path = %path.display(),
                bytes = request.audio.size_bytes(),
                "artifact written"
            );
            return Ok(path);
        }

        Err(Self::write_failed(
            &self.dir.join(request.file_name),
            "too many files with this name",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capture::{AudioData, AudioMimeType, ObjectUrls};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn candidate_names() {
        assert_eq!(candidate_name("recording.wav", 0), "recording.wav");
        assert_eq!(candidate_name("recording.wav", 2), "recording (2).wav");
        assert_eq!(candidate_name("clip", 1), "clip (1)");
        assert_eq!(candidate_name(".hidden", 1), ".hidden (1)");
    }

    #[tokio::test]
    async fn writes_into_created_directory_without_overwriting() {
        let dir = tempdir().unwrap();
        let exporter = FileExporter::new(dir.path().join("out"));
        let audio = Arc::new(AudioData::new(b"first".to_vec(), AudioMimeType::Webm));
        let mut urls = ObjectUrls::new();
        let reference = urls.create(Arc::clone(&audio));

        let request = ExportRequest {
            reference: &reference,
            audio: &audio,
            file_name: "recording.webm",
        };
        let first = exporter.export(request).await.unwrap();
        let second = exporter.export(request).await.unwrap();

        assert_eq!(first, dir.path().join("out").join("recording.webm"));
        assert_eq!(second, dir.path().join("out").join("recording (1).webm"));
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(std::fs::read(&second).unwrap(), b"first");
    }

    #[tokio::test]
    async fn unusable_directory_is_reported() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let exporter = FileExporter::new(blocker.join("sub"));
        let audio = AudioData::new(vec![0], AudioMimeType::Wav);
        let reference = ObjectUrls::new().create(Arc::new(audio.clone()));
        let result = exporter
            .export(ExportRequest {
                reference: &reference,
                audio: &audio,
                file_name: "recording.wav",
            })
            .await;

        assert!(matches!(result, Err(ExportError::DirectoryUnavailable(_))));
    }
}
