//! Conversions between image files and model tensors.
use anyhow::{bail, Result};
use image::imageops::FilterType::Lanczos3;
use image::{Rgb, RgbImage};
use ndarray::{Array3, ArrayBase, Dim, IxDynImpl, OwnedRepr};
use std::path::Path;
use tch::{Kind, Tensor};

/// Loads an image as a (3, H, W) float tensor with values in [-1, 1],
/// optionally resized to `size` = (width, height).
pub fn load_image(path: impl AsRef<Path>, size: Option<(u32, u32)>) -> Result<Tensor> {
    let mut img = image::open(path)?;
    if let Some((w, h)) = size {
        img = img.resize_exact(w, h, Lanczos3);
    }
    image_to_tensor(&img.to_rgb8())
}

pub fn image_to_tensor(img: &RgbImage) -> Result<Tensor> {
    let (w, h) = img.dimensions();
    let mut data: Array3<f32> = Array3::zeros((3, h as usize, w as usize));
    for (x, y, pixel) in img.enumerate_pixels() {
        for c in 0..3 {
            data[[c, y as usize, x as usize]] = ((pixel[c] as f32 / 255.) - 0.5) * 2.0;
        }
    }
    let tensor: Tensor = data.try_into()?;
    Ok(tensor)
}

/// Converts a (3, H, W) tensor in [-1, 1] back to an RGB image, e.g. an
/// aligned patch.
pub fn patch_to_image(patch: &Tensor) -> Result<RgbImage> {
    let (c, h, w) = patch.size3()?;
    if c != 3 {
        bail!("expected a 3 channel patch, got {c} channels");
    }
    let patch = patch.to_device(tch::Device::Cpu).to_kind(Kind::Float);
    let data: ArrayBase<OwnedRepr<f32>, Dim<IxDynImpl>> = (&patch).try_into()?;
    let mut image = RgbImage::new(w as _, h as _);
    for y in 0..h as usize {
        for x in 0..w as usize {
            let rgb = [0, 1, 2]
                .map(|c| ((data[[c, y, x]] / 2.0 + 0.5) * 255.).round().clamp(0., 255.) as u8);
            image.put_pixel(x as _, y as _, Rgb(rgb));
        }
    }
    Ok(image)
}

/// Marks each of the (4, 2) pixel-space corners with a small square.
pub fn draw_corners(image: &mut RgbImage, corners: &Tensor, color: Rgb<u8>) -> Result<()> {
    let (count, dims) = corners.size2()?;
    if dims != 2 {
        bail!("expected (N, 2) corners, got (N, {dims})");
    }
    let corners = corners.to_device(tch::Device::Cpu).to_kind(Kind::Float);
    let points = Vec::<f32>::try_from(&corners.view([-1]))?;
    let (w, h) = image.dimensions();
    for point in points.chunks(2).take(count as usize) {
        let (cx, cy) = (point[0].round() as i64, point[1].round() as i64);
        for y in (cy - 1)..=(cy + 1) {
            for x in (cx - 1)..=(cx + 1) {
                if x >= 0 && y >= 0 && x < w as i64 && y < h as i64 {
                    image.put_pixel(x as _, y as _, color);
                }
            }
        }
    }
    Ok(())
}
