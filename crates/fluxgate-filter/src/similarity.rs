//! Similarity scoring between consecutive frame representations

/// Cosine similarity of two flattened representations.
///
/// The norm product is clamped from below by `eps`, so a zero-energy input
/// yields `0.0` instead of `NaN`. Accumulation happens in `f64` to keep
/// identical large frames at (or within rounding of) `1.0`.
///
/// Callers must pass slices of equal length; extra elements of the longer
/// slice are ignored.
pub fn cosine_similarity(a: &[f32], b: &[f32], eps: f32) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = (norm_a.sqrt() * norm_b.sqrt()).max(eps as f64);
    (dot / denom).clamp(-1.0, 1.0) as f32
}

/// Map a cosine similarity in `[-1, 1]` to a sharpened score in `[0, 1]`.
///
/// `score = ((s + 1) / 2) ^ scale`. Larger scales push mid-range
/// similarities toward zero.
pub fn sharpened_score(similarity: f32, scale: f32) -> f32 {
    let unit = ((similarity + 1.0) / 2.0).clamp(0.0, 1.0);
    unit.powf(scale)
}

/// Complement of the admission probability for a drop candidate.
///
/// Equals `1 - (1 - score) / (1 - threshold)`. Only meaningful when
/// `score > threshold`, which also guarantees `threshold < 1`.
pub fn drop_weight(score: f32, threshold: f32) -> f32 {
    1.0 - (1.0 - score) / (1.0 - threshold)
}
