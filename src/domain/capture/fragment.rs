//! Captured fragments and the buffer that collects them

/// One chunk of audio delivered by the capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    bytes: Vec<u8>,
}

impl Fragment {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Build a PCM fragment from i16 samples (little-endian)
    pub fn from_samples(samples: &[i16]) -> Self {
        let bytes = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for Fragment {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Fragment {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

/// Ordered fragments of one recording session, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioBuffer {
    fragments: Vec<Fragment>,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Total buffered bytes across all fragments
    pub fn byte_len(&self) -> usize {
        self.fragments.iter().map(Fragment::len).sum()
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Concatenate all fragments in arrival order
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for fragment in &self.fragments {
            out.extend_from_slice(fragment.bytes());
        }
        out
    }
}
