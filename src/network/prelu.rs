//! A parametric rectified linear unit layer.
use std::borrow::Borrow;
use tch::nn;
use tch::nn::Module;
use tch::Tensor;

/// PReLU config.
#[derive(Debug, Clone, Copy)]
pub struct PReluConfig {
    pub ws_init: nn::Init,
}

impl Default for PReluConfig {
    fn default() -> Self {
        PReluConfig {
            ws_init: nn::Init::Const(0.25),
        }
    }
}

/// A PReLU layer with one learned negative slope per channel.
#[derive(Debug)]
pub struct PRelu {
    pub ws: Tensor,
}

/// Creates a PReLU over `num_parameters` channels.
///
/// The input shape is assumed to be (N, C, ...) with C == `num_parameters`.
pub fn prelu<'a, T: Borrow<nn::Path<'a>>>(
    vs: T,
    num_parameters: i64,
    config: PReluConfig,
) -> PRelu {
    let vs = vs.borrow();
    PRelu {
        ws: vs.var("weight", &[num_parameters], config.ws_init),
    }
}

impl Module for PRelu {
    fn forward(&self, xs: &Tensor) -> Tensor {
        xs.prelu(&self.ws)
    }
}
