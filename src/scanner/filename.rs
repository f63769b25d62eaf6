//! ファイル名・フォルダ名のパターン解析
//!
//! - 画像: `<idx>_<near|far>_<view>.jpg`
//! - ステップフォルダ: `stepN-pre` / `stepN-post`
//! - 撮影ポイントフォルダ: `pointN`
//! - 参照テキスト: `<idx>-<ref_step>-<ref_phase>-<ref_category>-<ref_idx>.txt`

use labvad_common::Phase;
use regex::Regex;

lazy_static::lazy_static! {
    static ref IMAGE_NAME_RE: Regex =
        Regex::new(r"^(?P<idx>\d+)_(?P<distance>near|far)_(?P<view>\d+)").unwrap();
    static ref STEP_SEGMENT_RE: Regex = Regex::new(r"^(?P<step>step\d+)-(?P<phase>pre|post)$").unwrap();
    static ref POINT_SEGMENT_RE: Regex = Regex::new(r"^point(?P<point>\d+)$").unwrap();
}

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// 画像ファイル名から読み取れる撮影条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName {
    pub index: u32,
    pub distance: String,
    pub view: u32,
}

/// 画像ファイル名（拡張子なし）を解析
pub fn parse_image_name(stem: &str) -> Option<ImageName> {
    let caps = IMAGE_NAME_RE.captures(stem)?;
    Some(ImageName {
        index: caps["idx"].parse().ok()?,
        distance: caps["distance"].to_string(),
        view: caps["view"].parse().ok()?,
    })
}

/// `stepN-pre` 形式のフォルダ名を (stepN, Phase) に分解
pub fn parse_step_segment(segment: &str) -> Option<(String, Phase)> {
    let caps = STEP_SEGMENT_RE.captures(segment)?;
    let phase = caps["phase"].parse().ok()?;
    Some((caps["step"].to_string(), phase))
}

/// `pointN` 形式のフォルダ名からポイント番号を取得
pub fn parse_point_segment(segment: &str) -> Option<u32> {
    POINT_SEGMENT_RE.captures(segment)?["point"].parse().ok()
}

pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// 参照テキストファイルの内容（ファイル名にエンコードされている）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSpec {
    /// このテキストが属するグループのindex（数字でなければ None）
    pub index: Option<u32>,
    pub ref_step: String,
    pub ref_phase: String,
    pub ref_category: String,
    pub ref_index: String,
}

impl ReferenceSpec {
    /// 参照先フォルダ名 `<ref_step>-<ref_phase>`
    pub fn step_folder(&self) -> String {
        format!("{}-{}", self.ref_step, self.ref_phase)
    }

    /// 参照先の画像ファイル名プレフィックス
    pub fn file_prefix(&self) -> String {
        format!("{}_", self.ref_index)
    }
}

/// 参照テキストのファイル名（拡張子なし）を解析
///
/// ハイフン区切りで5項目未満なら None。6項目目以降は無視する。
pub fn parse_reference_stem(stem: &str) -> Option<ReferenceSpec> {
    let parts: Vec<&str> = stem.split('-').collect();
    if parts.len() < 5 {
        return None;
    }
    let index = if !parts[0].is_empty() && parts[0].chars().all(|c| c.is_ascii_digit()) {
        parts[0].parse().ok()
    } else {
        None
    };
    Some(ReferenceSpec {
        index,
        ref_step: parts[1].to_string(),
        ref_phase: parts[2].to_string(),
        ref_category: parts[3].to_string(),
        ref_index: parts[4].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image_name() {
        let name = parse_image_name("3_near_0").unwrap();
        assert_eq!(name, ImageName { index: 3, distance: "near".into(), view: 0 });

        // 接尾辞があっても先頭一致で解析
        let name = parse_image_name("12_far_13_color").unwrap();
        assert_eq!(name.index, 12);
        assert_eq!(name.view, 13);

        assert!(parse_image_name("near_3_0").is_none());
        assert!(parse_image_name("3_mid_0").is_none());
        assert!(parse_image_name("x3_near_0").is_none());
    }

    #[test]
    fn test_parse_step_segment() {
        assert_eq!(parse_step_segment("step1-pre"), Some(("step1".into(), Phase::Pre)));
        assert_eq!(parse_step_segment("step12-post"), Some(("step12".into(), Phase::Post)));
        assert!(parse_step_segment("step1").is_none());
        assert!(parse_step_segment("step1-during").is_none());
        assert!(parse_step_segment("abnormal").is_none());
    }

    #[test]
    fn test_parse_point_segment() {
        assert_eq!(parse_point_segment("point7"), Some(7));
        assert!(parse_point_segment("points").is_none());
        assert!(parse_point_segment("step1-pre").is_none());
    }

    #[test]
    fn test_is_image_extension() {
        assert!(is_image_extension("jpg"));
        assert!(is_image_extension("JPG"));
        assert!(is_image_extension("jpeg"));
        assert!(is_image_extension("png"));
        assert!(!is_image_extension("txt"));
        assert!(!is_image_extension("xml"));
    }

    #[test]
    fn test_parse_reference_stem() {
        let spec = parse_reference_stem("2-step3-post-normal-5").unwrap();
        assert_eq!(spec.index, Some(2));
        assert_eq!(spec.step_folder(), "step3-post");
        assert_eq!(spec.ref_category, "normal");
        assert_eq!(spec.file_prefix(), "5_");

        let spec = parse_reference_stem("a-step3-post-normal-5-extra").unwrap();
        assert_eq!(spec.index, None);
        assert_eq!(spec.ref_index, "5");

        assert!(parse_reference_stem("2-step3-post-normal").is_none());
    }
}
