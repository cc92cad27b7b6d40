//! Face embedding network with a learned periocular alignment stage.
//!
//! image -> localization net -> four corners -> perspective warp to a 64x112
//! patch -> residual trunk -> L2-normalized 512-d embedding.
use crate::config::ModelConfig;
use crate::error::ConfigError;
use tch::nn::ModuleT;
use tch::{nn, Tensor};

pub mod bottleneck;
pub mod gate;
pub mod homography;
pub mod locnet;
pub mod prelu;
pub mod schedule;
pub mod stn;
pub mod trunk;

pub use stn::{Alignment, SpatialTransformer};
pub use trunk::{EmbeddingTrunk, EMBEDDING_SIZE};

/// Row-wise L2 normalization of an (N, D) tensor.
pub fn l2_norm(xs: &Tensor) -> Tensor {
    xs / xs.norm_scalaropt_dim(2, [1], true).clamp_min(1e-12)
}

#[derive(Debug)]
pub struct FaceModel {
    stn: SpatialTransformer,
    trunk: EmbeddingTrunk,
    config: ModelConfig,
}

impl FaceModel {
    /// Builds the model, rejecting an invalid config before any variable is
    /// created.
    pub fn new(p: &nn::Path, config: &ModelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let trunk = EmbeddingTrunk::new(p, config)?;
        let stn = SpatialTransformer::new(p);
        tracing::debug!(
            depth = config.depth.num_layers(),
            variant = ?config.variant,
            units = trunk.units(),
            drop_ratio = config.drop_ratio,
            "built face model"
        );
        Ok(Self {
            stn,
            trunk,
            config: *config,
        })
    }

    /// Validates the preset, variant name and drop ratio before building.
    pub fn from_preset(
        p: &nn::Path,
        num_layers: i64,
        drop_ratio: f64,
        variant: &str,
    ) -> Result<Self, ConfigError> {
        let config = ModelConfig::new(num_layers, drop_ratio, variant)?;
        Self::new(p, &config)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn spatial_transformer(&self) -> &SpatialTransformer {
        &self.stn
    }

    pub fn trunk(&self) -> &EmbeddingTrunk {
        &self.trunk
    }

    /// Unit-norm (N, 512) embeddings of (N, 3, H, W) images.
    pub fn embed(&self, xs: &Tensor, train: bool) -> Tensor {
        let patch = xs.apply_t(&self.stn, train);
        l2_norm(&patch.apply_t(&self.trunk, train))
    }

    /// The aligned (N, 3, 64, 112) periocular patches.
    pub fn align(&self, xs: &Tensor, train: bool) -> Tensor {
        xs.apply_t(&self.stn, train)
    }

    /// Same as [`FaceModel::align`], also returning the predicted corners.
    pub fn align_with_corners(&self, xs: &Tensor, train: bool) -> Alignment {
        self.stn.forward_with_corners(xs, train)
    }
}

impl ModuleT for FaceModel {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        self.embed(xs, train)
    }
}
