//! Export port: "download this object under a file name"

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::capture::{ArtifactRef, AudioData};

/// Export errors
#[derive(Debug, Clone, Error)]
pub enum ExportError {
    #[error("Output directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Failed to write {path}: {message}")]
    WriteFailed { path: String, message: String },
}

/// A single save action
#[derive(Debug, Clone, Copy)]
pub struct ExportRequest<'a> {
    /// Transient reference the audio is published under for this save
    pub reference: &'a ArtifactRef,
    pub audio: &'a AudioData,
    pub file_name: &'a str,
}

/// Port for persisting an artifact
#[async_trait]
pub trait ArtifactExporter: Send + Sync {
    /// Write the audio and return where it ended up
    async fn export(&self, request: ExportRequest<'_>) -> Result<PathBuf, ExportError>;
}
