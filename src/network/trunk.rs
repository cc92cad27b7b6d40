//! Residual embedding trunk operating on aligned patches.
use super::bottleneck::{conv2d, Bottleneck};
use super::prelu::prelu;
use super::schedule::{block_schedule, STAGE_CHANNELS, STEM_CHANNELS};
use super::stn::{PATCH_HEIGHT, PATCH_WIDTH};
use crate::config::ModelConfig;
use crate::error::ConfigError;
use tch::nn::ModuleT;
use tch::{nn, Tensor};

pub const EMBEDDING_SIZE: i64 = 512;

/// Spatial downsampling applied by the four strided stages.
const TRUNK_STRIDE: i64 = 16;

#[derive(Debug)]
pub struct EmbeddingTrunk {
    input_layer: nn::SequentialT,
    body: nn::SequentialT,
    output_layer: nn::SequentialT,
    units: usize,
}

impl EmbeddingTrunk {
    pub fn new(p: &nn::Path, config: &ModelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let stem = p / "input_layer";
        let input_layer = nn::seq_t()
            .add(conv2d(&stem / "0", 3, STEM_CHANNELS, 3, 1, 1))
            .add(nn::batch_norm2d(&stem / "1", STEM_CHANNELS, Default::default()))
            .add(prelu(&stem / "2", STEM_CHANNELS, Default::default()));

        let body_path = p / "body";
        let mut body = nn::seq_t();
        let mut units = 0;
        for spec in block_schedule(config.depth).into_iter().flatten() {
            body = body.add(Bottleneck::new(&body_path / units, spec, config.variant));
            units += 1;
        }

        let c_out = STAGE_CHANNELS[STAGE_CHANNELS.len() - 1];
        let flat = c_out * (PATCH_HEIGHT / TRUNK_STRIDE) * (PATCH_WIDTH / TRUNK_STRIDE);
        let head = p / "output_layer";
        let drop_ratio = config.drop_ratio;
        let output_layer = nn::seq_t()
            .add(nn::batch_norm2d(&head / "0", c_out, Default::default()))
            .add_fn_t(move |xs, train| xs.dropout(drop_ratio, train))
            .add_fn(|xs| xs.flatten(1, -1))
            .add(nn::linear(&head / "3", flat, EMBEDDING_SIZE, Default::default()))
            .add(nn::batch_norm1d(&head / "4", EMBEDDING_SIZE, Default::default()));

        Ok(Self {
            input_layer,
            body,
            output_layer,
            units,
        })
    }

    /// Number of bottleneck units in the body.
    pub fn units(&self) -> usize {
        self.units
    }
}

impl ModuleT for EmbeddingTrunk {
    /// Un-normalized (N, 512) embeddings of (N, 3, 64, 112) patches.
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        xs.apply_t(&self.input_layer, train)
            .apply_t(&self.body, train)
            .apply_t(&self.output_layer, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlockVariant, Depth};
    use tch::{Device, Kind};

    #[test]
    fn builds_one_unit_per_schedule_entry() {
        for (depth, units) in [(Depth::Ir50, 24), (Depth::Ir100, 49), (Depth::Ir152, 50)] {
            let vs = nn::VarStore::new(Device::Cpu);
            let config = ModelConfig {
                depth,
                variant: BlockVariant::Plain,
                ..Default::default()
            };
            let trunk = EmbeddingTrunk::new(&vs.root(), &config).unwrap();
            assert_eq!(trunk.units(), units);
            let last = format!("body.{}.res_layer.0.weight", units - 1);
            assert!(vs.variables().contains_key(&last));
        }
    }

    #[test]
    fn embeds_aligned_patches() {
        let vs = nn::VarStore::new(Device::Cpu);
        let trunk = EmbeddingTrunk::new(&vs.root(), &ModelConfig::default()).unwrap();
        let vars = vs.variables();
        assert_eq!(vars["output_layer.3.weight"].size(), vec![512, 512 * 4 * 7]);
        let xs = Tensor::randn([2, 3, PATCH_HEIGHT, PATCH_WIDTH], (Kind::Float, Device::Cpu));
        let ys = trunk.forward_t(&xs, false);
        assert_eq!(ys.size(), vec![2, EMBEDDING_SIZE]);
    }

    #[test]
    fn dropout_only_in_training() {
        let xs = Tensor::randn([2, 3, PATCH_HEIGHT, PATCH_WIDTH], (Kind::Float, Device::Cpu));
        let build = |drop_ratio| {
            let vs = nn::VarStore::new(Device::Cpu);
            let config = ModelConfig {
                drop_ratio,
                variant: BlockVariant::Plain,
                ..Default::default()
            };
            let trunk = EmbeddingTrunk::new(&vs.root(), &config).unwrap();
            (vs, trunk)
        };

        let (_vs, trunk) = build(0.4);
        tch::no_grad(|| {
            let a = trunk.forward_t(&xs, false);
            let b = trunk.forward_t(&xs, false);
            assert!(a.equal(&b), "eval outputs should be deterministic");
            let a = trunk.forward_t(&xs, true);
            let b = trunk.forward_t(&xs, true);
            assert!(!a.equal(&b), "training outputs should be dropped out");
        });

        // Same training-mode pass without dropout is deterministic.
        let (_vs, trunk) = build(0.0);
        tch::no_grad(|| {
            let a = trunk.forward_t(&xs, true);
            let b = trunk.forward_t(&xs, true);
            assert!(a.equal(&b));
        });
    }

    #[test]
    fn rejects_bad_drop_ratio() {
        let vs = nn::VarStore::new(Device::Cpu);
        let config = ModelConfig {
            drop_ratio: -0.1,
            ..Default::default()
        };
        let err = EmbeddingTrunk::new(&vs.root(), &config).unwrap_err();
        assert_eq!(err, ConfigError::InvalidDropRatio(-0.1));
    }
}
