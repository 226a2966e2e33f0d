//! Error types for tvae-rs.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Candle tensor/model error.
    #[error("candle: {0}")]
    Candle(#[from] candle_core::Error),

    /// Feature or latent width does not match what the component was built for.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Scaler used before `fit_transform`.
    #[error("scaler used before fit_transform")]
    ScalerNotFitted,

    /// Requested a sample of zero rows.
    #[error("sample count must be positive, got {0}")]
    InvalidSampleCount(usize),

    /// Training produced a NaN or infinite loss.
    #[error("non-finite loss at epoch {epoch}, batch {batch}")]
    NonFiniteLoss { epoch: usize, batch: usize },

    /// Linear-algebra failure (e.g. covariance is not positive definite).
    #[error("linear algebra: {0}")]
    LinAlg(String),

    /// Invalid configuration.
    #[error("config: {0}")]
    Config(String),

    /// I/O error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a width mismatch.
    pub(crate) fn shape(context: &'static str, expected: usize, actual: usize) -> Self {
        Error::ShapeMismatch {
            context,
            expected,
            actual,
        }
    }
}

/// Fail fast when the last dimension of `[N, W]` data is not `expected`.
pub(crate) fn check_width(
    context: &'static str,
    tensor: &candle_core::Tensor,
    expected: usize,
) -> Result<usize> {
    let (rows, width) = match tensor.dims() {
        [rows, width] => (*rows, *width),
        dims => return Err(Error::shape("matrix rank", 2, dims.len())),
    };
    if width != expected {
        return Err(Error::shape(context, expected, width));
    }
    Ok(rows)
}
