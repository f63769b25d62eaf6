//! CLIP入力用の画像前処理
//!
//! RGB化 → 短辺を指定サイズにリサイズ（Catmull-Rom）→ 中央切り出し →
//! [0,1] スケール → CLIP平均・標準偏差で正規化 → CHW配置

use crate::error::Result;
use image::imageops::{self, FilterType};
use image::DynamicImage;
use serde::Serialize;
use std::path::Path;

pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// 前処理済み画像（CHW, f32）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageTensor {
    pub shape: [usize; 3],
    pub data: Vec<f32>,
}

/// 短辺を size に合わせたときの (幅, 高さ)
fn scaled_dimensions(width: u32, height: u32, size: u32) -> (u32, u32) {
    if width <= height {
        let h = (height as f64 * size as f64 / width as f64).round() as u32;
        (size, h.max(size))
    } else {
        let w = (width as f64 * size as f64 / height as f64).round() as u32;
        (w.max(size), size)
    }
}

pub fn preprocess_image(img: &DynamicImage, size: u32) -> ImageTensor {
    let rgb = img.to_rgb8();
    let (w, h) = scaled_dimensions(rgb.width().max(1), rgb.height().max(1), size);
    let resized = imageops::resize(&rgb, w, h, FilterType::CatmullRom);
    let x = (w - size) / 2;
    let y = (h - size) / 2;
    let cropped = imageops::crop_imm(&resized, x, y, size, size).to_image();

    let plane = (size * size) as usize;
    let mut data = vec![0.0f32; 3 * plane];
    for (px, py, pixel) in cropped.enumerate_pixels() {
        let offset = (py * size + px) as usize;
        for c in 0..3 {
            let v = pixel[c] as f32 / 255.0;
            data[c * plane + offset] = (v - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }

    ImageTensor { shape: [3, size as usize, size as usize], data }
}

pub fn load_and_preprocess(path: &Path, size: u32) -> Result<ImageTensor> {
    let img = image::open(path)?;
    Ok(preprocess_image(&img, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_scaled_dimensions() {
        assert_eq!(scaled_dimensions(640, 480, 224), (299, 224));
        assert_eq!(scaled_dimensions(480, 640, 224), (224, 299));
        assert_eq!(scaled_dimensions(100, 100, 224), (224, 224));
    }

    #[test]
    fn test_preprocess_shape() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(64, 48));
        let tensor = preprocess_image(&img, 32);
        assert_eq!(tensor.shape, [3, 32, 32]);
        assert_eq!(tensor.data.len(), 3 * 32 * 32);
    }

    #[test]
    fn test_preprocess_normalizes_constant_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 40, Rgb([255, 0, 128])));
        let tensor = preprocess_image(&img, 16);
        let plane = 16 * 16;

        let red = tensor.data[0];
        let green = tensor.data[plane];
        let blue = tensor.data[2 * plane];
        assert!((red - (1.0 - CLIP_MEAN[0]) / CLIP_STD[0]).abs() < 1e-3);
        assert!((green - (0.0 - CLIP_MEAN[1]) / CLIP_STD[1]).abs() < 1e-3);
        assert!((blue - (128.0 / 255.0 - CLIP_MEAN[2]) / CLIP_STD[2]).abs() < 1e-2);
    }

    #[test]
    fn test_load_missing_image() {
        assert!(load_and_preprocess(Path::new("/nonexistent/0001.jpg"), 224).is_err());
    }
}
