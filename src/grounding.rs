//! ラベルXML（Pascal VOC形式）からグラウンディングを生成
//!
//! 画像 `<dir>/<name>.jpg` に対し `<dir>/label/<name>.xml` を読み込み、
//! `<object>` ごとにバウンディングボックスとカテゴリを割り当てる。

use crate::error::{LabVadError, Result};
use labvad_common::{BoundingBox, GroundingCategory, GroundingEntry};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// 異常として扱うオブジェクト名（大文字小文字を区別しない）
pub const ABNORMAL_TYPES: &[&str] = &[
    "Missing",
    "Inoperable Object",
    "Transformer Failure",
    "Unfulfilled Object",
    "Environmental Disturbance",
];

#[derive(Debug, Deserialize)]
struct VocAnnotation {
    #[serde(rename = "object", default)]
    objects: Vec<VocObject>,
}

#[derive(Debug, Deserialize)]
struct VocObject {
    #[serde(default)]
    name: String,
    bndbox: Option<VocBndBox>,
}

#[derive(Debug, Deserialize)]
struct VocBndBox {
    xmin: Option<String>,
    ymin: Option<String>,
    xmax: Option<String>,
    ymax: Option<String>,
}

/// 画像パスに対応するラベルXMLのパス
pub fn label_path_for(image_path: &Path) -> PathBuf {
    let parent = image_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = image_path.file_name().unwrap_or_default();
    parent.join("label").join(file_name).with_extension("xml")
}

fn is_abnormal_name(name: &str) -> bool {
    ABNORMAL_TYPES.iter().any(|t| t.eq_ignore_ascii_case(name))
}

fn parse_coord(value: Option<&String>, field: &str) -> std::result::Result<i64, String> {
    let raw = value.ok_or_else(|| format!("bndbox/{} がありません", field))?;
    raw.trim()
        .parse()
        .map_err(|_| format!("bndbox/{} が整数ではありません: {:?}", field, raw))
}

fn parse_bbox(bbox: &VocBndBox) -> std::result::Result<BoundingBox, String> {
    Ok(BoundingBox {
        xmin: parse_coord(bbox.xmin.as_ref(), "xmin")?,
        ymin: parse_coord(bbox.ymin.as_ref(), "ymin")?,
        xmax: parse_coord(bbox.xmax.as_ref(), "xmax")?,
        ymax: parse_coord(bbox.ymax.as_ref(), "ymax")?,
    })
}

/// XML文字列からグラウンディングを生成
///
/// 1つでも不正なオブジェクトがあれば全体をエラーにする（部分的な結果は返さない）。
pub fn parse_grounding(xml: &str, anomaly_type: Option<&str>) -> std::result::Result<Vec<GroundingEntry>, String> {
    let annotation: VocAnnotation = quick_xml::de::from_str(xml).map_err(|e| e.to_string())?;

    annotation
        .objects
        .iter()
        .map(|obj| {
            let name = obj.name.trim();
            let bbox = obj
                .bndbox
                .as_ref()
                .ok_or_else(|| format!("object {:?} に bndbox がありません", name))?;
            let bbox = parse_bbox(bbox)?;

            let entry = if is_abnormal_name(name) {
                GroundingEntry {
                    text_span: "Abnormal region".into(),
                    bbox,
                    category: GroundingCategory::Anomaly(anomaly_type.map(str::to_string)),
                }
            } else if name.eq_ignore_ascii_case("normal") {
                GroundingEntry {
                    text_span: "Normal region".into(),
                    bbox,
                    category: GroundingCategory::Normal,
                }
            } else {
                GroundingEntry {
                    text_span: name.to_string(),
                    bbox,
                    category: GroundingCategory::Object,
                }
            };
            Ok(entry)
        })
        .collect()
}

/// 画像のラベルXMLを読み込みグラウンディングを生成
///
/// # Arguments
/// * `image_path` - 画像ファイルのパス
/// * `anomaly_type` - 記述の異常種別（異常オブジェクトのカテゴリになる）
///
/// # Errors
/// * ラベルXMLが存在しない → `FileNotFound`
/// * XML構造・座標が不正 → `LabelParse`
pub fn generate_grounding(image_path: &Path, anomaly_type: Option<&str>) -> Result<Vec<GroundingEntry>> {
    let xml_path = label_path_for(image_path);
    if !xml_path.exists() {
        return Err(LabVadError::FileNotFound(format!(
            "ラベルXMLが見つかりません: {}",
            xml_path.display()
        )));
    }

    let xml = std::fs::read_to_string(&xml_path)?;
    parse_grounding(&xml, anomaly_type).map_err(|message| {
        log::error!("グラウンディング生成に失敗: {}: {}", image_path.display(), message);
        LabVadError::LabelParse { path: xml_path, message }
    })
}
