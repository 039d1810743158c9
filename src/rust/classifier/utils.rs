use ndarray::ArrayView1;

/// Numerically stable softmax over raw logits.
pub(crate) fn softmax(logits: ArrayView1<f32>) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum).collect()
}

/// Indices of the `k` largest probabilities, highest first.
///
/// `k` is clamped to `1..=len`. Equal probabilities keep index order.
pub(crate) fn top_k_indices(probs: &[f32], k: usize) -> Vec<usize> {
    let k = k.clamp(1, probs.len().max(1));
    let mut indexed: Vec<usize> = (0..probs.len()).collect();
    // NaN ranks below every real score
    let score = |i: usize| if probs[i].is_nan() { f32::NEG_INFINITY } else { probs[i] };
    // sort_by is stable, so ties stay in class order
    indexed.sort_by(|&a, &b| score(b).total_cmp(&score(a)));
    indexed.truncate(k);
    indexed
}
