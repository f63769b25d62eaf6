//! 異常検知プロンプト生成モジュール
//!
//! 視覚言語モデルによる異常分類用のプロンプト:
//! - SYSTEM_PROMPT: システムプロンプト
//! - PromptLevel: ステップ情報の開示レベル別テンプレート
//! - build_detection_prompt: ユーザープロンプト生成

use crate::types::{Phase, StepMetadata};

/// システムプロンプト
pub const SYSTEM_PROMPT: &str = "You are an AI assistant for automated anomaly detection in a robotic chemical laboratory. Your role is to visually inspect laboratory procedures, identifying any abnormalities that may disrupt experiments or pose safety risks to laboratory staff.";

/// 組立ライン全体の説明（全テンプレート共通）
const PROCESS_CONTEXT: &str = r#"Additional Context:
We have a robotic chemical laboratory silicone preparation assembly line. The overall process is as follows:
- A mobile robot arm moves silicone and pigment from the material table to the workbench.
- A fixed robot arm picks up clean test tubes from Test Tube Rack 1, places them on an unscrewing device to remove the tube caps, and then places them on a balance.
- The fixed robot arm then takes silicone liquid and pigment from the workbench and sequentially pours measured amounts into the test tubes.
- Afterwards, the fixed robot arm removes the test tubes from the balance, moves them to the unscrewing device to screw the caps back on, and places the test tubes onto a shaker.
- The fixed robot arm moves a mold from the workbench to a tray, unscrews and pours out the contents of the shaken test tubes into the mold, replaces the caps, and places the test tubes onto Test Tube Rack 2.
- The mold is then brushed smooth and left to dry.
- Finally, the mobile robot arm returns silicone and pigment bottles from the workbench back to the material table.
- The process then ends."#;

const SUBTASK_HINT: &str = "--if you don't know the current subtask, you'll have to judge for yourself in the context of the overall process. If you know the current subtask, it will be helpful to locate exceptions in the image.";

const ANOMALY_ANSWER_FORMAT: &str = r#"1.Yes, there is an anomaly in this picture.
or
2.No, there is no anomaly in this picture."#;

/// プロンプトの情報開示レベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptLevel {
    /// ステップ情報 + 点検指示（標準）
    #[default]
    Basic,
    /// 点検指示のみ（ステップ情報なし）
    Level0,
    /// ステップ情報 + 点検指示（インライン）
    Level1,
    /// ステップ情報 + 点検内容セクション
    Level2,
    /// 正常条件に合致するかを問う
    Normal,
    /// 異常条件に合致するかを問う
    Abnormal,
}

impl std::str::FromStr for PromptLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" | "user" => Ok(PromptLevel::Basic),
            "level0" | "0" => Ok(PromptLevel::Level0),
            "level1" | "1" => Ok(PromptLevel::Level1),
            "level2" | "2" => Ok(PromptLevel::Level2),
            "normal" => Ok(PromptLevel::Normal),
            "abnormal" => Ok(PromptLevel::Abnormal),
            _ => Err(format!(
                "Unknown prompt level: {}. Use basic, level0, level1, level2, normal or abnormal",
                s
            )),
        }
    }
}

/// プロンプトに埋め込むステップ情報
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepDetails {
    pub operator: String,
    pub obj: String,
    pub start_position: String,
    pub dest_position: String,
    pub subtask: String,
}

impl From<&StepMetadata> for StepDetails {
    fn from(meta: &StepMetadata) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            operator: text(&meta.operator),
            obj: text(&meta.obj),
            start_position: text(&meta.start_position),
            dest_position: text(&meta.dest_position),
            subtask: text(&meta.subtask),
        }
    }
}

/// フェーズの点検場所・点検内容から点検指示文を組み立てる
pub fn inspection_instructions(meta: &StepMetadata, phase: Phase) -> String {
    let check = meta.check(phase);
    let mut lines = Vec::new();
    if let Some(location) = check.location.filter(|s| !s.trim().is_empty()) {
        lines.push(format!("Inspection location: {}", location.trim()));
    }
    if let Some(content) = check.content.filter(|s| !s.trim().is_empty()) {
        lines.push(format!("Inspection content: {}", content.trim()));
    }
    lines.join("\n")
}

/// ユーザープロンプト生成
///
/// # Arguments
/// * `level` - 情報開示レベル
/// * `details` - ステップ情報
/// * `instructions` - 点検指示文
pub fn build_detection_prompt(level: PromptLevel, details: &StepDetails, instructions: &str) -> String {
    let StepDetails { operator, obj, start_position, dest_position, subtask } = details;

    match level {
        PromptLevel::Basic => format!(
            r#"You are currently performing anomaly detection in a scientific laboratory setting. Below are the details of the current step:

Step Details:
Operator: {operator}
Object: {obj}
From: {start_position}
To: {dest_position}
Subtask: {subtask}

{PROCESS_CONTEXT}

Inspection Instructions:
{instructions}
Think step-by-step reasoning, and Your response should follow this format:
{ANOMALY_ANSWER_FORMAT}
"#
        ),
        PromptLevel::Level0 => format!(
            r#"You are currently performing anomaly detection in a scientific laboratory setting.

{instructions}.
Based on the pictures I give you, Think step-by-step reasoning, and Your response should follow this format:
{ANOMALY_ANSWER_FORMAT}

{PROCESS_CONTEXT}
{SUBTASK_HINT}
"#
        ),
        PromptLevel::Level1 => format!(
            r#"You are currently performing anomaly detection in a scientific laboratory setting. Below are the details of the current step:

Step Details:
Operator: {operator}
Object: {obj}
From(start_position): {start_position}
To(dest_position): {dest_position}
Subtask: {subtask}

{instructions}.
Based on the pictures I give you, Think step-by-step reasoning, and Your response should follow this format:
{ANOMALY_ANSWER_FORMAT}

{PROCESS_CONTEXT}
{SUBTASK_HINT}
"#
        ),
        PromptLevel::Level2 => format!(
            r#"You are currently performing anomaly detection in a scientific laboratory setting. Below are the details of the current step:

Step Details:
Operator: {operator}
Object: {obj}
From(start_position): {start_position}
To(dest_position): {dest_position}
Subtask: {subtask}

Inspection Contents:
{instructions}

Think step-by-step reasoning, and Your response should follow this format:
{ANOMALY_ANSWER_FORMAT}

{PROCESS_CONTEXT}
{SUBTASK_HINT}
"#
        ),
        PromptLevel::Normal | PromptLevel::Abnormal => {
            let condition = if level == PromptLevel::Normal {
                "1.Yes, this picture follow the normal condition.\nor\n2.No, there is an anomaly in this picture."
            } else {
                "1.Yes, this picture follow the abnormal condition.\nor\n2.No, there is no anomaly in this picture."
            };
            format!(
                r#"You are currently performing anomaly detection in a scientific laboratory setting. Below are the details of the current step:

Step Details:
Operator: {operator}
Object: {obj}
From(start_position): {start_position}
To(dest_position): {dest_position}
Subtask: {subtask}

Inspection Instructions:
{instructions}
Think step-by-step reasoning, and Your response should follow this format:
{condition}

{PROCESS_CONTEXT}
{SUBTASK_HINT}
"#
            )
        }
    }
}
