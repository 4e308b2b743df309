use thiserror::Error;

/// All errors produced by slidecue-core.
#[derive(Debug, Error)]
pub enum SlidecueError {
    /// Malformed or unsupported WAV container. Retrying reproduces it.
    #[error("WAV format error: {0}")]
    Format(String),

    /// A visible slide has a zero-length time window. The upstream recording
    /// data is corrupted; the slide cannot be aligned.
    #[error("slide {page} has no recorded timing (start == end)")]
    InconsistentRecording { page: u32 },

    #[error("invalid wrap bounds: min_length {min} must be below max_length {max}")]
    InvalidWrapBounds { min: usize, max: usize },

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("segment list error: {0}")]
    SegmentList(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SlidecueError>;
