use crate::error::{LabVadError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// エンコーダコマンドを上書きする環境変数
pub const ENCODER_ENV: &str = "LABVAD_ENCODER";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 埋め込みエンコーダの起動コマンド（argv）
    pub encoder_command: Option<Vec<String>>,
    /// エンコーダに通知するモデル名
    pub model: String,
    /// CLIPScoreの重み w
    pub clip_weight: f64,
    /// 候補テキストの接頭辞
    pub text_prefix: String,
    /// 前処理後の画像サイズ（正方形）
    pub image_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            encoder_command: None,
            model: "openai/clip-vit-base-patch32".into(),
            clip_weight: labvad_common::DEFAULT_WEIGHT,
            text_prefix: "A photo depicts".into(),
            image_size: 224,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| LabVadError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("labvad").join("config.json"))
    }

    /// エンコーダコマンドを取得（環境変数を優先）
    pub fn encoder_command(&self) -> Result<Vec<String>> {
        if let Ok(value) = std::env::var(ENCODER_ENV) {
            let argv = split_command(&value);
            if !argv.is_empty() {
                return Ok(argv);
            }
        }

        match &self.encoder_command {
            Some(argv) if !argv.is_empty() => Ok(argv.clone()),
            _ => Err(LabVadError::MissingEncoder),
        }
    }

    pub fn set_encoder_command(&mut self, argv: Vec<String>) -> Result<()> {
        if argv.is_empty() {
            return Err(LabVadError::Config("エンコーダコマンドが空です".into()));
        }
        self.encoder_command = Some(argv);
        self.save()
    }

    pub fn set_model(&mut self, model: String) -> Result<()> {
        self.model = model;
        self.save()
    }

    /// 埋め込みキャッシュの識別子（モデルと入力サイズ）
    pub fn cache_key(&self) -> String {
        format!("{}@{}", self.model, self.image_size)
    }
}

fn split_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.clip_weight, 2.5);
        assert_eq!(config.text_prefix, "A photo depicts");
        assert_eq!(config.image_size, 224);
        assert!(config.encoder_command.is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"clip_weight": 1.0}"#).unwrap();
        assert_eq!(config.clip_weight, 1.0);
        assert_eq!(config.image_size, 224);
    }

    #[test]
    fn test_cache_key() {
        let config = Config { image_size: 336, ..Config::default() };
        assert_eq!(config.cache_key(), "openai/clip-vit-base-patch32@336");
    }

    #[test]
    fn test_split_command() {
        assert_eq!(
            split_command("  python3 encoder.py --model clip "),
            vec!["python3", "encoder.py", "--model", "clip"]
        );
        assert!(split_command("   ").is_empty());
    }
}
