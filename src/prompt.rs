//! 異常検知プロンプトの生成
//!
//! metasteps_caption.json のステップ情報から、視覚言語モデルに渡す
//! システムプロンプトとユーザープロンプトを組み立てる。

use crate::assembler::Metasteps;
use crate::error::{LabVadError, Result};
use dialoguer::Select;
use labvad_common::{build_detection_prompt, inspection_instructions, Phase, PromptLevel, StepDetails, SYSTEM_PROMPT};

/// 生成したプロンプト
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub step: String,
    pub phase: Phase,
    pub system: &'static str,
    pub user: String,
}

/// ステップ・フェーズ・レベルを指定してプロンプトを生成
pub fn render_prompt(meta: &Metasteps, step: &str, phase: Phase, level: PromptLevel) -> Result<RenderedPrompt> {
    let entry = meta
        .get(step)
        .ok_or_else(|| LabVadError::UnknownStep(step.to_string()))?;

    let details = StepDetails::from(entry);
    let instructions = inspection_instructions(entry, phase);
    Ok(RenderedPrompt {
        step: step.to_string(),
        phase,
        system: SYSTEM_PROMPT,
        user: build_detection_prompt(level, &details, &instructions),
    })
}

/// 選択肢の表示名（"step1: subtask"）
fn step_label(step: &str, subtask: Option<&str>) -> String {
    match subtask.map(str::trim).filter(|s| !s.is_empty()) {
        Some(subtask) => format!("{}: {}", step, subtask),
        None => step.to_string(),
    }
}

/// 対話式でステップを選択
pub fn select_step_interactive(meta: &Metasteps) -> Result<String> {
    if meta.is_empty() {
        return Err(LabVadError::UnknownStep("メタデータにステップがありません".into()));
    }

    let labels: Vec<String> = meta
        .iter()
        .map(|(step, entry)| step_label(step, entry.subtask.as_deref()))
        .collect();

    let selection = Select::new()
        .with_prompt("ステップを選択してください")
        .items(&labels)
        .default(0)
        .interact()
        .map_err(|e| LabVadError::Interaction(e.to_string()))?;

    Ok(meta.keys()[selection].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const META_JSON: &str = r#"{
        "1": {
            "operator": "fixed robot arm",
            "obj": "test tube",
            "start_position": "Test Tube Rack 1",
            "dest_position": "unscrewing device",
            "subtask": "move test tube",
            "preCheckLocation": "Test Tube Rack 1",
            "preCheckContent": "Check that a test tube is present"
        }
    }"#;

    #[test]
    fn test_render_prompt() {
        let meta = Metasteps::from_json(META_JSON).unwrap();
        let prompt = render_prompt(&meta, "step1", Phase::Pre, PromptLevel::Basic).unwrap();

        assert_eq!(prompt.system, SYSTEM_PROMPT);
        assert!(prompt.user.contains("fixed robot arm"));
        assert!(prompt.user.contains("Inspection location: Test Tube Rack 1"));
        assert!(prompt.user.contains("Check that a test tube is present"));
    }

    #[test]
    fn test_render_prompt_unknown_step() {
        let meta = Metasteps::from_json(META_JSON).unwrap();
        assert!(matches!(
            render_prompt(&meta, "step9", Phase::Post, PromptLevel::Level0),
            Err(LabVadError::UnknownStep(_))
        ));
    }

    #[test]
    fn test_step_label() {
        assert_eq!(step_label("step1", Some(" move tube ")), "step1: move tube");
        assert_eq!(step_label("step2", Some("")), "step2");
        assert_eq!(step_label("step3", None), "step3");
    }
}
