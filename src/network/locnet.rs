//! Corner-regression network driving the spatial transformer.
use super::bottleneck::Bottleneck;
use super::schedule::BottleneckSpec;
use crate::config::BlockVariant;
use tch::nn::ModuleT;
use tch::{nn, Tensor};

/// Number of regressed values: four (x, y) corners in [-1, 1] space.
pub const CORNER_OUTPUTS: i64 = 8;

/// Head bias for which the predicted corners cover the whole input square,
/// ordered top-left, top-right, bottom-right, bottom-left.
pub const IDENTITY_CORNERS: [f32; 8] = [-1., -1., 1., -1., 1., 1., -1., 1.];

/// Fixed topology, independent of the trunk depth and variant.
pub const LOCNET_UNITS: [BottleneckSpec; 5] = [
    BottleneckSpec::new(3, 16, 2),
    BottleneckSpec::new(16, 32, 2),
    BottleneckSpec::new(32, 32, 2),
    BottleneckSpec::new(32, 64, 2),
    BottleneckSpec::new(64, 64, 1),
];

#[derive(Debug)]
pub struct LocalizationNet {
    body: nn::SequentialT,
    head: nn::Linear,
}

impl LocalizationNet {
    /// Builds the network and applies the identity-corner warp initialization.
    pub fn new(p: nn::Path) -> Self {
        let mut body = nn::seq_t();
        for (i, spec) in LOCNET_UNITS.iter().enumerate() {
            body = body.add(Bottleneck::new(&p / i, *spec, BlockVariant::Plain));
        }
        let c_out = LOCNET_UNITS[LOCNET_UNITS.len() - 1].out_channels;
        let head = nn::linear(&p / "7", c_out, CORNER_OUTPUTS, Default::default());
        let mut locnet = Self { body, head };
        locnet.init_identity_corners();
        locnet
    }

    /// Identity-corner warp initialization: zero weight and a bias holding
    /// [`IDENTITY_CORNERS`], so every input initially maps to the full square.
    pub fn init_identity_corners(&mut self) {
        tch::no_grad(|| {
            self.head.ws.zero_();
            if let Some(bs) = self.head.bs.as_mut() {
                let corners = Tensor::from_slice(&IDENTITY_CORNERS).to_device(bs.device());
                bs.copy_(&corners);
            }
        });
        tracing::debug!("localization head set to identity corners");
    }

    /// The final projection layer.
    pub fn head(&self) -> &nn::Linear {
        &self.head
    }
}

impl ModuleT for LocalizationNet {
    /// Raw (N, 8) corner predictions, before clamping.
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        xs.apply_t(&self.body, train)
            .adaptive_avg_pool2d([1, 1])
            .flatten(1, -1)
            .apply(&self.head)
    }
}
