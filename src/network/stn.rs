//! Spatial transformer producing the canonical periocular patch.
use super::homography::{perspective_transform, warp_perspective};
use super::locnet::{LocalizationNet, IDENTITY_CORNERS};
use tch::nn::ModuleT;
use tch::{nn, Kind, Tensor};

/// Output patch height.
pub const PATCH_HEIGHT: i64 = 64;
/// Output patch width.
pub const PATCH_WIDTH: i64 = 112;

/// Pixel extent the normalized [-1, 1] corners are rescaled to: [0, 127].
pub const CORNER_SCALE: f64 = 63.5;

/// Destination corners, same order as the predicted ones.
pub const DESTINATION_CORNERS: [f32; 8] = [
    0.,
    0.,
    (PATCH_WIDTH - 1) as f32,
    0.,
    (PATCH_WIDTH - 1) as f32,
    (PATCH_HEIGHT - 1) as f32,
    0.,
    (PATCH_HEIGHT - 1) as f32,
];

/// A warped batch with the source corners it was cut from.
#[derive(Debug)]
pub struct Alignment {
    /// (N, C, 64, 112)
    pub patch: Tensor,
    /// (N, 4, 2) pixel coordinates in the input image.
    pub corners: Tensor,
}

/// Clamps raw (N, 8) localization output to [-1, 1], rescales it to pixels and
/// reshapes it to (N, 4, 2).
pub fn corners_from_raw(raw: &Tensor) -> Tensor {
    ((raw.clamp(-1.0, 1.0) + 1.0) * CORNER_SCALE).view([-1, 4, 2])
}

#[derive(Debug)]
pub struct SpatialTransformer {
    locnet: LocalizationNet,
    points_dst: Tensor,
    identity_src: Tensor,
}

impl SpatialTransformer {
    pub fn new(p: &nn::Path) -> Self {
        let locnet = LocalizationNet::new(p / "locnet");
        let mut points_dst = p.zeros_no_train("points_dst", &[1, 4, 2]);
        tch::no_grad(|| {
            let dst = Tensor::from_slice(&DESTINATION_CORNERS).view([1, 4, 2]);
            points_dst.copy_(&dst.to_device(points_dst.device()))
        });
        // Corners of the identity-corner head, substituted for samples whose
        // predicted corners give a singular system.
        let identity = Tensor::from_slice(&IDENTITY_CORNERS).to_device(p.device());
        let identity_src = corners_from_raw(&identity);
        Self {
            locnet,
            points_dst,
            identity_src,
        }
    }

    pub fn locnet(&self) -> &LocalizationNet {
        &self.locnet
    }

    /// The (1, 4, 2) destination rectangle.
    pub fn destination(&self) -> &Tensor {
        &self.points_dst
    }

    pub fn forward_with_corners(&self, xs: &Tensor, train: bool) -> Alignment {
        let corners = corners_from_raw(&xs.apply_t(&self.locnet, train));
        let n = corners.size()[0];
        let points_dst = self.points_dst.repeat([n, 1, 1]);

        // Degenerate samples are swapped out before the differentiable solve,
        // so neither pass ever sees a singular system.
        let valid = tch::no_grad(|| perspective_transform(&corners, &points_dst).1);
        let src = corners.where_self(
            &valid.view([n, 1, 1]),
            &self.identity_src.to_kind(corners.kind()),
        );
        if tracing::enabled!(tracing::Level::WARN) {
            if let Ok(rejected) = i64::try_from(valid.logical_not().sum(Kind::Int64)) {
                if rejected > 0 {
                    tracing::warn!(
                        rejected,
                        batch = n,
                        "degenerate corners, using identity-corner transform"
                    );
                }
            }
        }

        let (m, _) = perspective_transform(&src, &points_dst);
        let patch = warp_perspective(xs, &m, (PATCH_HEIGHT, PATCH_WIDTH));
        Alignment { patch, corners }
    }
}

impl ModuleT for SpatialTransformer {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        self.forward_with_corners(xs, train).patch
    }
}
