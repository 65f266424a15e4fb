use crate::Float;

pub type Result<T> = std::result::Result<T, QgError>;

#[derive(Debug, thiserror::Error)]
pub enum QgError {
    /// Invalid grid, boundary markers, field shapes or solver settings. Detected at setup.
    #[error("configuration error on grid {shape:?}: {reason}")]
    Configuration { shape: [usize; 3], reason: String },

    /// The PV inversion did not converge. The physical fields can no longer be trusted.
    #[error(
        "inversion on grid {shape:?} failed after {iters} iterations \
         (residual {residual:e}, target {target:e}): {reason}"
    )]
    Convergence {
        shape: [usize; 3],
        iters: usize,
        residual: Float,
        target: Float,
        reason: &'static str,
    },

    /// Corrupted data met while stepping.
    #[error("numerical domain error at {index:?} on grid {shape:?}: {reason} (value {value})")]
    NumericalDomain {
        shape: [usize; 3],
        index: [usize; 3],
        value: Float,
        reason: &'static str,
    },
}

impl QgError {
    pub fn configuration(shape: [usize; 3], reason: impl Into<String>) -> Self {
        Self::Configuration {
            shape,
            reason: reason.into(),
        }
    }
}
