/// Error type for opening and streaming a mono WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WavError {
    #[error("Failed to read from the byte source.")]
    SourceRead,
    #[error("The file is not a RIFF/WAVE file with a fmt chunk followed by a data chunk.")]
    MalformedHeader,
    #[error("Only uncompressed 8bit or 16bit mono linear PCM is supported.")]
    UnsupportedFormat,
    #[error("Failed to allocate a sample buffer.")]
    AllocationFailure,
    #[error("The player has been deinitialized.")]
    Deinitialized,
}
