//! LabVAD Common Library
//!
//! CLIとレポート生成で共有される型とユーティリティ

pub mod types;
pub mod views;
pub mod score;
pub mod prompts;
pub mod parser;
pub mod error;

pub use types::{
    AnomalyDescription, BoundingBox, Category, CheckResult, ClipScoreResult, GroundingCategory,
    GroundingEntry, Phase, PhaseCheck, Record, StepMetadata,
};
pub use views::{view_index, view_name, GROUPED_VIEW_ORDER, VIEW_NAMES};
pub use score::{clip_score, cosine_similarity, harmonic_mean, ref_clip_score, DEFAULT_WEIGHT};
pub use prompts::{build_detection_prompt, inspection_instructions, PromptLevel, StepDetails, SYSTEM_PROMPT};
pub use parser::{parse_clip_results, parse_records};
pub use error::{Error, Result};
