//! CLIPScore / RefCLIPScore の計算
//!
//! 埋め込みベクトルは正規化前のものを受け取り、内部でL2正規化する。

use crate::error::{Error, Result};

/// 既定の重み（CLIPScore論文の w = 2.5）
pub const DEFAULT_WEIGHT: f64 = 2.5;

/// コサイン類似度
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch { left: a.len(), right: b.len() });
    }

    let norm_a = a.iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(Error::ZeroVector);
    }

    let dot: f64 = a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum();
    Ok(dot / (norm_a * norm_b))
}

/// CLIPScore = weight * max(cos, 0)
pub fn clip_score(cosine: f64, weight: f64) -> f64 {
    weight * cosine.max(0.0)
}

/// 2値の調和平均（どちらかが0以下なら0）
pub fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a <= 0.0 || b <= 0.0 {
        return 0.0;
    }
    2.0 * a * b / (a + b)
}

/// RefCLIPScore = HMean(CLIPScore, max_r max(cos(candidate, r), 0))
///
/// 参照文が無い場合は None。
pub fn ref_clip_score(clip: f64, reference_cosines: &[f64]) -> Option<f64> {
    let best = reference_cosines
        .iter()
        .map(|c| c.max(0.0))
        .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.max(c))))?;
    Some(harmonic_mean(clip, best))
}
