//! Construction-time errors.
use std::fmt;

/// Raised before any layer is built when a model configuration is rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    UnsupportedDepth(i64),
    UnknownVariant(String),
    InvalidDropRatio(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedDepth(depth) => {
                write!(f, "unsupported depth {depth}, expected one of 50, 100, 152")
            }
            Self::UnknownVariant(name) => {
                write!(
                    f,
                    "unknown block variant '{name}', expected 'plain' (ir) or 'gated' (ir_se)"
                )
            }
            Self::InvalidDropRatio(ratio) => {
                write!(f, "drop ratio {ratio} is outside [0, 1)")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
