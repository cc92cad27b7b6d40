//! Comparison of face embeddings.
use anyhow::Result;
use tch::Tensor;

/// Row-wise cosine similarity of two (N, D) embedding batches.
pub fn cosine_similarity(a: &Tensor, b: &Tensor) -> Tensor {
    Tensor::cosine_similarity(a, b, 1, 1e-8)
}

/// Row-wise euclidean distance of two (N, D) embedding batches.
pub fn l2_distance(a: &Tensor, b: &Tensor) -> Tensor {
    (a - b).norm_scalaropt_dim(2, [1], false)
}

/// Whether each pair of embeddings lies within `threshold` L2 distance.
pub fn is_match(a: &Tensor, b: &Tensor, threshold: f64) -> Result<Vec<bool>> {
    let matches = l2_distance(a, b).le(threshold);
    Ok(Vec::<bool>::try_from(&matches)?)
}
