//! Model configuration.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Depth preset of the embedding trunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Depth {
    Ir50,
    Ir100,
    Ir152,
}

impl Depth {
    /// Number of bottleneck units in each of the four stages.
    pub fn stage_units(self) -> [usize; 4] {
        match self {
            Depth::Ir50 => [3, 4, 14, 3],
            Depth::Ir100 => [3, 13, 30, 3],
            Depth::Ir152 => [3, 8, 36, 3],
        }
    }

    pub fn num_layers(self) -> i64 {
        match self {
            Depth::Ir50 => 50,
            Depth::Ir100 => 100,
            Depth::Ir152 => 152,
        }
    }
}

impl TryFrom<i64> for Depth {
    type Error = ConfigError;

    fn try_from(num_layers: i64) -> Result<Self, Self::Error> {
        match num_layers {
            50 => Ok(Depth::Ir50),
            100 => Ok(Depth::Ir100),
            152 => Ok(Depth::Ir152),
            other => Err(ConfigError::UnsupportedDepth(other)),
        }
    }
}

impl From<Depth> for i64 {
    fn from(depth: Depth) -> Self {
        depth.num_layers()
    }
}

/// Bottleneck flavour used throughout the embedding trunk.
///
/// The localization network always uses [`BlockVariant::Plain`], whatever is
/// selected here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockVariant {
    #[serde(alias = "ir")]
    Plain,
    #[serde(alias = "ir_se")]
    Gated,
}

impl FromStr for BlockVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" | "ir" => Ok(Self::Plain),
            "gated" | "ir_se" => Ok(Self::Gated),
            _ => Err(ConfigError::UnknownVariant(s.to_string())),
        }
    }
}

/// Face model config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawModelConfig")]
pub struct ModelConfig {
    pub depth: Depth,
    pub drop_ratio: f64,
    pub variant: BlockVariant,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            depth: Depth::Ir50,
            drop_ratio: 0.4,
            variant: BlockVariant::Gated,
        }
    }
}

impl ModelConfig {
    /// Validates every field before anything is built.
    pub fn new(num_layers: i64, drop_ratio: f64, variant: &str) -> Result<Self, ConfigError> {
        let config = ModelConfig {
            depth: Depth::try_from(num_layers)?,
            drop_ratio,
            variant: variant.parse()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.drop_ratio.is_finite() || !(0.0..1.0).contains(&self.drop_ratio) {
            return Err(ConfigError::InvalidDropRatio(self.drop_ratio));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawModelConfig {
    depth: Depth,
    drop_ratio: f64,
    variant: BlockVariant,
}

impl TryFrom<RawModelConfig> for ModelConfig {
    type Error = ConfigError;

    fn try_from(raw: RawModelConfig) -> Result<Self, Self::Error> {
        let config = ModelConfig {
            depth: raw.depth,
            drop_ratio: raw.drop_ratio,
            variant: raw.variant,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_depth() {
        assert_eq!(Depth::try_from(34), Err(ConfigError::UnsupportedDepth(34)));
        assert_eq!(Depth::try_from(100), Ok(Depth::Ir100));
    }

    #[test]
    fn parses_variant_aliases() {
        assert_eq!("ir".parse::<BlockVariant>(), Ok(BlockVariant::Plain));
        assert_eq!("IR_SE".parse::<BlockVariant>(), Ok(BlockVariant::Gated));
        assert!(matches!(
            "dense".parse::<BlockVariant>(),
            Err(ConfigError::UnknownVariant(_))
        ));
    }

    #[test]
    fn validates_drop_ratio() {
        assert!(ModelConfig::new(50, 0.4, "gated").is_ok());
        assert_eq!(
            ModelConfig::new(50, 1.0, "gated"),
            Err(ConfigError::InvalidDropRatio(1.0))
        );
        assert!(ModelConfig::new(50, f64::NAN, "plain").is_err());
    }

    #[test]
    fn serde_round_trip() {
        let config = ModelConfig::new(152, 0.2, "plain").unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"depth":152,"drop_ratio":0.2,"variant":"plain"}"#);
        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn deserialization_validates() {
        let aliased: ModelConfig =
            serde_json::from_str(r#"{"depth":100,"drop_ratio":0.4,"variant":"ir_se"}"#).unwrap();
        assert_eq!(aliased.variant, BlockVariant::Gated);
        assert!(serde_json::from_str::<ModelConfig>(
            r#"{"depth":18,"drop_ratio":0.4,"variant":"plain"}"#
        )
        .is_err());
        assert!(serde_json::from_str::<ModelConfig>(
            r#"{"depth":50,"drop_ratio":1.5,"variant":"plain"}"#
        )
        .is_err());
    }
}
