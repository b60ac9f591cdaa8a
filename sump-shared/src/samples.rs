/// Captured samples in chronological order.
///
/// The device sends the newest sample first; the buffer is reversed once on
/// receipt so consumers can iterate forwards. Each sample is `width` bytes,
/// one per enabled group, kept in the byte order the device sent them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    width: usize,
    data: Vec<u8>,
}

impl SampleBuffer {
    /// Build from the bytes as read from the device
    pub fn from_device(raw: &[u8], width: usize) -> Self {
        assert!(width > 0, "sample width must be at least one byte");
        let data = raw
            .rchunks_exact(width)
            .flat_map(|sample| sample.iter().copied())
            .collect();

        SampleBuffer { width, data }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.data.len() / self.width
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.data.chunks_exact(self.width)
    }

    /// Each sample as one word, first group byte most significant
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.iter()
            .map(|sample| sample.iter().fold(0u32, |word, &b| (word << 8) | u32::from(b)))
    }
}
