//! Face recognition with a learned spatial-transformer alignment stage.
pub mod config;
pub mod error;
pub mod image_io;
pub mod network;
pub mod verify;

pub use config::{BlockVariant, Depth, ModelConfig};
pub use error::ConfigError;
pub use network::{l2_norm, Alignment, FaceModel, EMBEDDING_SIZE};
