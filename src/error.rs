use thiserror::Error;

/// Errors raised while configuring or running an attack.
///
/// Running out of trials without a label flip is not an error: the engines report
/// it through the success flag of their result.
#[derive(Error, Debug)]
pub enum AttackError {
    #[error("{attack} doesn't support targeted attacks")]
    TargetedNotSupported { attack: &'static str },

    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("label {label} is out of range for {nb_classes} classes")]
    LabelOutOfRange { label: usize, nb_classes: usize },

    #[error("model query failed: {0}")]
    Model(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AttackError {
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AttackError>;
