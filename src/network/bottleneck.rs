//! Improved-residual bottleneck units.
//!
//! The residual branch is BN-conv-PReLU-conv-BN, optionally followed by a
//! [`ChannelGate`]. See "ArcFace: Additive Angular Margin Loss for Deep Face
//! Recognition" Deng et al. 2018 <https://arxiv.org/abs/1801.07698>
use super::gate::{ChannelGate, GATE_REDUCTION};
use super::prelu::{prelu, PRelu};
use super::schedule::BottleneckSpec;
use crate::config::BlockVariant;
use tch::nn::{Conv2D, ModuleT};
use tch::{nn, Tensor};

pub(crate) fn conv2d(
    p: nn::Path,
    c_in: i64,
    c_out: i64,
    ksize: i64,
    padding: i64,
    stride: i64,
) -> Conv2D {
    let conv2d_cfg = nn::ConvConfig {
        stride,
        padding,
        bias: false,
        ..Default::default()
    };
    nn::conv2d(p, c_in, c_out, ksize, conv2d_cfg)
}

/// The skip branch of a bottleneck.
#[derive(Debug)]
pub enum Shortcut {
    /// Kernel-1 max-pool: pure subsampling, only used when widths match.
    Pool { stride: i64 },
    /// 1x1 strided convolution followed by batch-norm.
    Projection { conv: Conv2D, bn: nn::BatchNorm },
}

impl Shortcut {
    pub fn new(p: nn::Path, c_in: i64, c_out: i64, stride: i64) -> Self {
        if c_in == c_out {
            Shortcut::Pool { stride }
        } else {
            Shortcut::Projection {
                conv: conv2d(&p / "0", c_in, c_out, 1, 0, stride),
                bn: nn::batch_norm2d(&p / "1", c_out, Default::default()),
            }
        }
    }
}

impl ModuleT for Shortcut {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        match self {
            Shortcut::Pool { stride } => {
                xs.max_pool2d([1, 1], [*stride, *stride], [0, 0], [1, 1], false)
            }
            Shortcut::Projection { conv, bn } => xs.apply(conv).apply_t(bn, train),
        }
    }
}

/// A residual unit, plain or channel-gated.
#[derive(Debug)]
pub struct Bottleneck {
    bn1: nn::BatchNorm,
    conv1: Conv2D,
    prelu: PRelu,
    conv2: Conv2D,
    bn2: nn::BatchNorm,
    gate: Option<ChannelGate>,
    shortcut: Shortcut,
}

impl Bottleneck {
    pub fn new(p: nn::Path, spec: BottleneckSpec, variant: BlockVariant) -> Self {
        let BottleneckSpec {
            in_channels: c_in,
            out_channels: c_out,
            stride,
        } = spec;
        let res = &p / "res_layer";
        let gate = match variant {
            BlockVariant::Plain => None,
            BlockVariant::Gated => Some(ChannelGate::new(&res / "5", c_out, GATE_REDUCTION)),
        };
        Self {
            bn1: nn::batch_norm2d(&res / "0", c_in, Default::default()),
            conv1: conv2d(&res / "1", c_in, c_out, 3, 1, 1),
            prelu: prelu(&res / "2", c_out, Default::default()),
            conv2: conv2d(&res / "3", c_out, c_out, 3, 1, stride),
            bn2: nn::batch_norm2d(&res / "4", c_out, Default::default()),
            gate,
            shortcut: Shortcut::new(&p / "shortcut_layer", c_in, c_out, stride),
        }
    }

    pub fn is_gated(&self) -> bool {
        self.gate.is_some()
    }

    pub fn shortcut(&self) -> &Shortcut {
        &self.shortcut
    }

    fn residual(&self, xs: &Tensor, train: bool) -> Tensor {
        let ys = xs
            .apply_t(&self.bn1, train)
            .apply(&self.conv1)
            .apply(&self.prelu)
            .apply(&self.conv2)
            .apply_t(&self.bn2, train);
        match &self.gate {
            Some(gate) => ys.apply(gate),
            None => ys,
        }
    }
}

impl ModuleT for Bottleneck {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        self.residual(xs, train) + xs.apply_t(&self.shortcut, train)
    }
}
