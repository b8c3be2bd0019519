//! Assembly of buffered fragments into a playable artifact

use std::io::Cursor;
use std::sync::Arc;

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;

use super::audio_data::{AudioData, AudioFormat};
use super::fragment::AudioBuffer;
use super::object_url::ArtifactRef;

/// Errors while assembling an artifact
#[derive(Debug, Clone, Error)]
pub enum AssemblyError {
    #[error("PCM data ends in a partial sample ({0} bytes)")]
    PartialSample(usize),

    #[error("Failed to write WAV container: {0}")]
    Container(String),
}

/// Buffer and format handed out by a session when it stops.
/// Owning this value is the only way to reach the fragments of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCapture {
    buffer: AudioBuffer,
    format: AudioFormat,
}

impl CompletedCapture {
    pub(crate) fn new(buffer: AudioBuffer, format: AudioFormat) -> Self {
        Self { buffer, format }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn fragment_count(&self) -> usize {
        self.buffer.len()
    }

    /// True when the device delivered no audio at all
    pub fn is_empty(&self) -> bool {
        self.buffer.byte_len() == 0
    }

    /// Concatenate the fragments into one audio object.
    ///
    /// Encoded fragments are joined as-is. PCM fragments are joined and
    /// framed in a WAV container so the artifact's label matches its bytes.
    pub fn assemble(self) -> Result<AudioData, AssemblyError> {
        let mime_type = self.format.mime_type();
        let bytes = self.buffer.concat();

        match self.format {
            AudioFormat::Encoded(_) => Ok(AudioData::new(bytes, mime_type)),
            AudioFormat::Pcm16 {
                sample_rate,
                channels,
            } => {
                if bytes.len() % 2 != 0 {
                    return Err(AssemblyError::PartialSample(bytes.len()));
                }
                let wav = wrap_pcm16(&bytes, sample_rate, channels)?;
                Ok(AudioData::new(wav, mime_type))
            }
        }
    }
}

fn wrap_pcm16(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>, AssemblyError> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| AssemblyError::Container(e.to_string()))?;
        for pair in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| AssemblyError::Container(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| AssemblyError::Container(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// An assembled clip together with the reference it is published under.
#[derive(Debug, Clone)]
pub struct PlayableArtifact {
    reference: ArtifactRef,
    audio: Arc<AudioData>,
}

impl PlayableArtifact {
    pub fn new(reference: ArtifactRef, audio: Arc<AudioData>) -> Self {
        Self { reference, audio }
    }

    pub fn reference(&self) -> &ArtifactRef {
        &self.reference
    }

    pub fn audio(&self) -> &Arc<AudioData> {
        &self.audio
    }
}
