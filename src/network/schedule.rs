//! Bottleneck layout of the embedding trunk.
use crate::config::Depth;

/// Output channels of the four stages.
pub const STAGE_CHANNELS: [i64; 4] = [64, 128, 256, 512];

/// Channels entering the first stage, as produced by the stem.
pub const STEM_CHANNELS: i64 = 64;

/// Describes a single bottleneck unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BottleneckSpec {
    pub in_channels: i64,
    pub out_channels: i64,
    pub stride: i64,
}

impl BottleneckSpec {
    pub const fn new(in_channels: i64, out_channels: i64, stride: i64) -> Self {
        Self {
            in_channels,
            out_channels,
            stride,
        }
    }
}

/// One stage: a strided unit that changes width, then `units - 1` units at
/// constant width.
pub fn stage(in_channels: i64, out_channels: i64, units: usize) -> Vec<BottleneckSpec> {
    let mut specs = Vec::with_capacity(units);
    if units == 0 {
        return specs;
    }
    specs.push(BottleneckSpec::new(in_channels, out_channels, 2));
    specs.extend((1..units).map(|_| BottleneckSpec::new(out_channels, out_channels, 1)));
    specs
}

/// The four stages for a depth preset.
pub fn block_schedule(depth: Depth) -> Vec<Vec<BottleneckSpec>> {
    let mut c_in = STEM_CHANNELS;
    depth
        .stage_units()
        .iter()
        .zip(STAGE_CHANNELS)
        .map(|(&units, c_out)| {
            let specs = stage(c_in, c_out, units);
            c_in = c_out;
            specs
        })
        .collect()
}
