//! データセットの型定義
//!
//! CLIとレポート生成で共有される型:
//! - StepMetadata: metasteps_caption.json の1ステップ分
//! - GroundingEntry: ラベルXMLから抽出したバウンディングボックス
//! - Record: 最終出力（画像1枚 × 異常記述1件）
//! - ClipScoreResult: CLIPScore計算結果

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 点検フェーズ（工程の前/後）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Pre,
    Post,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Pre, Phase::Post];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pre => "pre",
            Phase::Post => "post",
        }
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pre" => Ok(Phase::Pre),
            "post" => Ok(Phase::Post),
            _ => Err(format!("Unknown phase: {}. Use pre or post", s)),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 記述カテゴリ（正常/異常）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Normal,
    Abnormal,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Normal, Category::Abnormal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Normal => "normal",
            Category::Abnormal => "abnormal",
        }
    }

    pub fn is_abnormal(&self) -> bool {
        matches!(self, Category::Abnormal)
    }
}

/// 異常/正常の記述1件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDescription {
    #[serde(rename = "type", default)]
    pub anomaly_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// 点検結果ブロック（preCheckRes / postCheckRes）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    #[serde(default)]
    pub normal: Option<Vec<AnomalyDescription>>,
    #[serde(default)]
    pub abnormal: Option<Vec<AnomalyDescription>>,
}

impl CheckResult {
    /// カテゴリの記述一覧（null は空扱い）
    pub fn descriptions(&self, category: Category) -> &[AnomalyDescription] {
        let list = match category {
            Category::Normal => &self.normal,
            Category::Abnormal => &self.abnormal,
        };
        list.as_deref().unwrap_or(&[])
    }
}

/// 工程ステップのメタデータ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepMetadata {
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub obj: Option<String>,
    #[serde(default)]
    pub start_position: Option<String>,
    #[serde(default)]
    pub dest_position: Option<String>,
    #[serde(default)]
    pub subtask: Option<String>,

    #[serde(rename = "preCheckType", default)]
    pub pre_check_type: Option<String>,
    #[serde(rename = "preCheckLocation", default)]
    pub pre_check_location: Option<String>,
    #[serde(rename = "preCheckContent", default)]
    pub pre_check_content: Option<String>,
    #[serde(rename = "preCheckRes", default)]
    pub pre_check_res: Option<CheckResult>,

    #[serde(rename = "postCheckType", default)]
    pub post_check_type: Option<String>,
    #[serde(rename = "postCheckLocation", default)]
    pub post_check_location: Option<String>,
    #[serde(rename = "postCheckContent", default)]
    pub post_check_content: Option<String>,
    #[serde(rename = "postCheckRes", default)]
    pub post_check_res: Option<CheckResult>,
}

/// フェーズ別の点検情報への参照
#[derive(Debug, Clone, Copy)]
pub struct PhaseCheck<'a> {
    pub check_type: Option<&'a str>,
    pub location: Option<&'a str>,
    pub content: Option<&'a str>,
    pub result: Option<&'a CheckResult>,
}

impl PhaseCheck<'_> {
    pub fn descriptions(&self, category: Category) -> &[AnomalyDescription] {
        self.result.map(|r| r.descriptions(category)).unwrap_or(&[])
    }
}

impl StepMetadata {
    pub fn check(&self, phase: Phase) -> PhaseCheck<'_> {
        match phase {
            Phase::Pre => PhaseCheck {
                check_type: self.pre_check_type.as_deref(),
                location: self.pre_check_location.as_deref(),
                content: self.pre_check_content.as_deref(),
                result: self.pre_check_res.as_ref(),
            },
            Phase::Post => PhaseCheck {
                check_type: self.post_check_type.as_deref(),
                location: self.post_check_location.as_deref(),
                content: self.post_check_content.as_deref(),
                result: self.post_check_res.as_ref(),
            },
        }
    }
}

/// バウンディングボックス（JSONでは [xmin, ymin, xmax, ymax]）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i64; 4]", into = "[i64; 4]")]
pub struct BoundingBox {
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

impl From<[i64; 4]> for BoundingBox {
    fn from(v: [i64; 4]) -> Self {
        Self { xmin: v[0], ymin: v[1], xmax: v[2], ymax: v[3] }
    }
}

impl From<BoundingBox> for [i64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.xmin, b.ymin, b.xmax, b.ymax]
    }
}

/// グラウンディングのカテゴリ
///
/// JSONでは文字列: 異常は記述の異常種別（無ければ null）、正常は "Normal"、
/// それ以外のオブジェクトは "object"。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroundingCategory {
    Anomaly(Option<String>),
    Normal,
    Object,
}

impl Serialize for GroundingCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GroundingCategory::Anomaly(Some(t)) => serializer.serialize_str(t),
            GroundingCategory::Anomaly(None) => serializer.serialize_none(),
            GroundingCategory::Normal => serializer.serialize_str("Normal"),
            GroundingCategory::Object => serializer.serialize_str("object"),
        }
    }
}

impl<'de> Deserialize<'de> for GroundingCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(match value.as_deref() {
            Some("Normal") => GroundingCategory::Normal,
            Some("object") => GroundingCategory::Object,
            _ => GroundingCategory::Anomaly(value),
        })
    }
}

/// グラウンディング1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingEntry {
    pub text_span: String,
    pub bbox: BoundingBox,
    pub category: GroundingCategory,
}

/// アノテーションレコード
///
/// (step, phase, category, 記述index, 画像) ごとに1件。
/// キー名は既存データセットの表記に合わせる。旧形式のキー（小文字等）も読み込み可。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Image_Id", alias = "image_id")]
    pub image_id: String,

    #[serde(rename = "Stage_Description", default)]
    pub stage_description: Option<String>,

    #[serde(default)]
    pub step: String,

    #[serde(default)]
    pub phase: String,

    #[serde(rename = "Operator", default)]
    pub operator: Option<String>,

    #[serde(rename = "Obj", default)]
    pub obj: Option<String>,

    #[serde(rename = "Start_Position", default)]
    pub start_position: Option<String>,

    #[serde(rename = "Dest_Position", default)]
    pub dest_position: Option<String>,

    #[serde(rename = "Checktype", default)]
    pub check_type: Option<String>,

    #[serde(rename = "CheckDev", default)]
    pub check_dev: String,

    #[serde(rename = "Detection_Location", default)]
    pub detection_location: Option<String>,

    #[serde(rename = "Detection_Content", default)]
    pub detection_content: Option<String>,

    #[serde(rename = "Views", alias = "views", default)]
    pub views: Option<String>,

    #[serde(rename = "Distance", alias = "distance", default)]
    pub distance: Option<String>,

    #[serde(rename = "Anomaly_Label", alias = "anomaly_Label", default)]
    pub anomaly_label: bool,

    #[serde(rename = "Anomaly_Type", alias = "anomaly_Type", default)]
    pub anomaly_type: Option<String>,

    #[serde(
        rename = "Anomaly_Label_Description",
        alias = "Anomaly Label Description",
        default
    )]
    pub anomaly_label_description: Option<String>,

    #[serde(rename = "Caption", alias = "caption", default)]
    pub caption: Option<String>,

    #[serde(rename = "Grounding", default)]
    pub grounding: Vec<GroundingEntry>,

    /// 撮影ポイント番号（元パスの pointN）
    #[serde(rename = "Point", default)]
    pub point: Option<u32>,

    /// 元画像のパス（dataディレクトリ相対）
    #[serde(rename = "Source_Image", default)]
    pub source_image: Option<String>,
}

/// CLIPScore計算結果（1レコード1件）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipScoreResult {
    pub image_id: String,
    pub absolute_path: String,
    pub clip_score: Option<f64>,
    pub ref_clip_score: Option<f64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<u32>,
}
