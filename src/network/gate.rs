//! Squeeze-and-excitation channel gating.
//!
//! See "Squeeze-and-Excitation Networks" Hu et al. 2017
//! <https://arxiv.org/abs/1709.01507>
use tch::nn::{ConvConfig, Module};
use tch::{nn, Tensor};

pub const GATE_REDUCTION: i64 = 16;

/// Rescales every channel of a feature map by a learned factor in [0, 1]
/// computed from its global average.
#[derive(Debug)]
pub struct ChannelGate {
    fc1: nn::Conv2D,
    fc2: nn::Conv2D,
}

impl ChannelGate {
    pub fn new(p: nn::Path, channels: i64, reduction: i64) -> Self {
        let cfg = ConvConfig {
            bias: false,
            ..Default::default()
        };
        let hidden = channels / reduction;
        Self {
            fc1: nn::conv2d(&p / "fc1", channels, hidden, 1, cfg),
            fc2: nn::conv2d(&p / "fc2", hidden, channels, 1, cfg),
        }
    }

    /// The per-channel factors, shaped (N, C, 1, 1).
    pub fn weights(&self, xs: &Tensor) -> Tensor {
        xs.adaptive_avg_pool2d([1, 1])
            .apply(&self.fc1)
            .relu()
            .apply(&self.fc2)
            .sigmoid()
    }
}

impl Module for ChannelGate {
    fn forward(&self, xs: &Tensor) -> Tensor {
        xs * self.weights(xs)
    }
}
