use thiserror::Error;

/// Errors surfaced at the crate's API boundary. The intersection kernels
/// themselves never fail (they report misses with a zero distance), so
/// everything here comes from construction, scene state, or image formats.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("dimension must be at least 3, got {0}")]
    BadDimension(usize),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("axis {axis} is out of range for dimension {dimension}")]
    InvalidAxis { axis: usize, dimension: usize },

    #[error("split position lies outside the box along the split axis")]
    SplitOutOfRange,

    #[error("matrix is singular")]
    SingularMatrix,

    #[error("a simplex in dimension {dimension} requires exactly {dimension} points, got {got}")]
    WrongPointCount { dimension: usize, got: usize },

    #[error("simplex points are affinely dependent")]
    DegenerateSimplex,

    #[error("the scene is locked by a running render")]
    SceneLocked,

    #[error("the renderer is already running")]
    AlreadyRunning,

    #[error("channel bit size {0} is invalid: integer channels take 1-31 bits, float channels exactly 32")]
    BadChannelSize(u8),

    #[error("too many bits per pixel: {0} exceeds the {max}-byte maximum", max = crate::pixels::MAX_PIXELSIZE)]
    PixelTooWide(u32),

    #[error("pitch {pitch} is smaller than a row of pixels ({row} bytes)")]
    BadPitch { pitch: usize, row: usize },

    #[error("destination buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
