//! Transient references to assembled audio

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::audio_data::AudioData;

const SCHEME: &str = "blob:voice-capture/";

/// URL-like handle for an assembled audio object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of live artifact references.
///
/// A reference resolves only until it is revoked; ids are never reused.
#[derive(Debug, Default)]
pub struct ObjectUrls {
    next_id: u64,
    entries: HashMap<ArtifactRef, Arc<AudioData>>,
}

impl ObjectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish audio under a fresh reference
    pub fn create(&mut self, audio: Arc<AudioData>) -> ArtifactRef {
        self.next_id += 1;
        let reference = ArtifactRef(format!("{}{}", SCHEME, self.next_id));
        self.entries.insert(reference.clone(), audio);
        reference
    }

    /// Invalidate a reference. Returns false if it was not live.
    pub fn revoke(&mut self, reference: &ArtifactRef) -> bool {
        self.entries.remove(reference).is_some()
    }

    pub fn revoke_all(&mut self) {
        self.entries.clear();
    }

    /// Number of live references
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
