use thiserror::Error;

/// Malformed job or result messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("texture size {0} outside 1..=512")]
    TextureSize(u32),
    #[error("non-finite vector `{0}`")]
    NonFinite(&'static str),
    #[error("distance limit {0} must be finite and positive")]
    DistanceLimit(f64),
    #[error("texel buffer holds {actual} bytes, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
}
