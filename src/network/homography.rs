//! Batched four-point perspective transforms.
use tch::{Kind, Tensor};

/// Divisor magnitude below which the homogeneous coordinate is left unscaled.
const HOMOGENEOUS_EPS: f64 = 1e-8;

/// Solves, per sample, the homography mapping `src` onto `dst`.
///
/// Both inputs are (N, 4, 2) point sets in pixel coordinates. Returns the
/// (N, 3, 3) matrices together with an (N,) boolean tensor marking the samples
/// whose correspondence system was solvable and produced finite values.
pub fn perspective_transform(src: &Tensor, dst: &Tensor) -> (Tensor, Tensor) {
    let n = src.size()[0];
    let (x, y) = (src.select(2, 0), src.select(2, 1));
    let (u, v) = (dst.select(2, 0), dst.select(2, 1));
    let ones = x.ones_like();
    let zeros = x.zeros_like();

    // Two equations per correspondence, each row of shape (N, 4, 8).
    let row_u = Tensor::stack(
        &[&x, &y, &ones, &zeros, &zeros, &zeros, &(-&x * &u), &(-&y * &u)],
        -1,
    );
    let row_v = Tensor::stack(
        &[&zeros, &zeros, &zeros, &x, &y, &ones, &(-&x * &v), &(-&y * &v)],
        -1,
    );
    let a = Tensor::stack(&[row_u, row_v], 2).view([n, 8, 8]);
    let b = Tensor::stack(&[&u, &v], 2).view([n, 8, 1]);

    let (h, info) = Tensor::linalg_solve_ex(&a, &b, true, false);
    let h = Tensor::cat(&[h.view([n, 8]), Tensor::ones([n, 1], (h.kind(), h.device()))], 1)
        .view([n, 3, 3]);
    let finite = h.isfinite().view([n, 9]).all_dim(1, false);
    let valid = info.eq(0).logical_and(&finite);
    (h, valid)
}

/// Maps (N, P, 2) points through (N, 3, 3) homographies.
pub fn transform_points(m: &Tensor, points: &Tensor) -> Tensor {
    let ones = points.narrow(2, 0, 1).ones_like();
    let homogeneous = Tensor::cat(&[points, &ones], 2).matmul(&m.transpose(1, 2));
    from_homogeneous(&homogeneous)
}

fn from_homogeneous(points: &Tensor) -> Tensor {
    let z = points.narrow(2, 2, 1);
    let scale = z
        .reciprocal()
        .where_self(&z.abs().gt(HOMOGENEOUS_EPS), &z.ones_like());
    points.narrow(2, 0, 2) * scale
}

/// Resamples `xs` (N, C, H, W) into an `(height, width)` canvas so that the
/// source pixel p lands on `m * p`.
///
/// Bilinear interpolation with align-corners semantics; destination pixels
/// whose preimage falls outside the source image are zero.
pub fn warp_perspective(xs: &Tensor, m: &Tensor, (height, width): (i64, i64)) -> Tensor {
    let size = xs.size();
    let (n, src_h, src_w) = (size[0], size[2], size[3]);
    let opts = (Kind::Float, xs.device());

    let gx = Tensor::arange(width, opts).view([1, width]).expand([height, width], false);
    let gy = Tensor::arange(height, opts).view([height, 1]).expand([height, width], false);
    let grid = Tensor::stack(&[gx, gy], -1)
        .view([1, height * width, 2])
        .expand([n, height * width, 2], false);

    let src = transform_points(&m.to_kind(Kind::Float).inverse(), &grid);
    let norm_x = src.select(2, 0) * (2.0 / (src_w - 1).max(1) as f64) - 1.0;
    let norm_y = src.select(2, 1) * (2.0 / (src_h - 1).max(1) as f64) - 1.0;
    let grid = Tensor::stack(&[norm_x, norm_y], -1).view([n, height, width, 2]);

    // bilinear = 0, zeros padding = 0
    xs.to_kind(Kind::Float).grid_sampler_2d(&grid, 0, 0, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn points(values: &[f32]) -> Tensor {
        Tensor::from_slice(values).view([1, 4, 2])
    }

    fn max_diff(a: &Tensor, b: &Tensor) -> f64 {
        f64::try_from((a - b).abs().max().to_kind(Kind::Double)).unwrap()
    }

    #[test]
    fn maps_source_corners_onto_destination() {
        let src = points(&[3., 5., 120., 10., 110., 125., 8., 100.]);
        let dst = points(&[0., 0., 111., 0., 111., 63., 0., 63.]);
        let (m, valid) = perspective_transform(&src, &dst);
        assert_eq!(m.size(), vec![1, 3, 3]);
        assert_eq!(Vec::<bool>::try_from(&valid).unwrap(), vec![true]);
        let mapped = transform_points(&m, &src);
        assert!(max_diff(&mapped, &dst) < 1e-2, "corners not mapped: {mapped:?}");
    }

    #[test]
    fn identical_points_give_identity() {
        let pts = points(&[0., 0., 10., 0., 10., 10., 0., 10.]);
        let (m, _) = perspective_transform(&pts, &pts);
        let eye = Tensor::eye(3, (Kind::Float, Device::Cpu)).unsqueeze(0);
        assert!(max_diff(&m, &eye) < 1e-4);
    }

    #[test]
    fn collinear_points_are_flagged() {
        let src = Tensor::cat(
            &[
                points(&[0., 0., 1., 1., 2., 2., 3., 3.]),
                points(&[0., 0., 127., 0., 127., 127., 0., 127.]),
            ],
            0,
        );
        let dst = points(&[0., 0., 111., 0., 111., 63., 0., 63.]).repeat([2, 1, 1]);
        let (_, valid) = perspective_transform(&src, &dst);
        assert_eq!(Vec::<bool>::try_from(&valid).unwrap(), vec![false, true]);
    }

    #[test]
    fn identity_warp_reproduces_the_image() {
        let xs = Tensor::rand([2, 3, 6, 9], (Kind::Float, Device::Cpu));
        let eye = Tensor::eye(3, (Kind::Float, Device::Cpu)).unsqueeze(0).repeat([2, 1, 1]);
        let ys = warp_perspective(&xs, &eye, (6, 9));
        assert!(max_diff(&xs, &ys) < 1e-5);
    }

    #[test]
    fn translation_shifts_and_pads_with_zeros() {
        let xs = Tensor::arange(16, (Kind::Float, Device::Cpu)).view([1, 1, 4, 4]) + 1.0;
        // Move every source pixel one column to the right.
        let shift = Tensor::from_slice(&[1f32, 0., 1., 0., 1., 0., 0., 0., 1.]).view([1, 3, 3]);
        let ys = warp_perspective(&xs, &shift, (4, 4));
        assert!(max_diff(&ys.narrow(3, 1, 3), &xs.narrow(3, 0, 3)) < 1e-5);
        assert!(max_diff(&ys.narrow(3, 0, 1), &ys.narrow(3, 0, 1).zeros_like()) < 1e-6);
    }
}
