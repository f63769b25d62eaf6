//! 件数ヒートマップのPNG出力
//!
//! 行 = ビュー、列 = 撮影ポイント。セルの濃さは件数 / 最大件数（Blues）。

use super::Matrix;
use crate::error::Result;
use image::{Rgb, RgbImage};
use std::path::Path;

pub const CELL_SIZE: u32 = 32;
const GRID: Rgb<u8> = Rgb([200, 200, 200]);

/// Blues カラーマップの代表色（0.0 → 1.0）
const BLUES: [[u8; 3]; 5] = [
    [247, 251, 255],
    [198, 219, 239],
    [107, 174, 214],
    [33, 113, 181],
    [8, 48, 107],
];

/// 0.0〜1.0 の値を色に変換
pub fn blues(t: f64) -> Rgb<u8> {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (BLUES.len() - 1) as f64;
    let i = (scaled.floor() as usize).min(BLUES.len() - 2);
    let frac = scaled - i as f64;
    let (a, b) = (BLUES[i], BLUES[i + 1]);
    Rgb([0, 1, 2].map(|c| (a[c] as f64 + (b[c] as f64 - a[c] as f64) * frac).round() as u8))
}

/// 行列をヒートマップ画像に変換（罫線付き）
pub fn heatmap_image(matrix: &Matrix) -> RgbImage {
    let rows = matrix.row_labels.len().max(1) as u32;
    let cols = matrix.col_labels.len().max(1) as u32;
    let max = matrix.max();
    let mut img = RgbImage::from_pixel(cols * CELL_SIZE + 1, rows * CELL_SIZE + 1, GRID);

    for (r, row) in matrix.values.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            let color = blues(if max > 0.0 { value / max } else { 0.0 });
            let (x0, y0) = (c as u32 * CELL_SIZE, r as u32 * CELL_SIZE);
            for y in (y0 + 1)..(y0 + CELL_SIZE) {
                for x in (x0 + 1)..(x0 + CELL_SIZE) {
                    img.put_pixel(x, y, color);
                }
            }
        }
    }
    img
}

pub fn render_heatmap(matrix: &Matrix, path: &Path) -> Result<()> {
    heatmap_image(matrix).save(path)?;
    log::debug!("ヒートマップ出力: {} ({})", path.display(), matrix.title);
    Ok(())
}
