//! 埋め込みキャッシュモジュール
//!
//! 画像はファイル内容、テキストは文字列のSHA-256をキーにして埋め込みを保存し、
//! 同じ入力の再エンコードをスキップする。

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub const CACHE_FILE_NAME: &str = ".clipscore-cache.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCache {
    /// バージョン（互換性チェック用）
    version: u32,
    /// モデル名と入力サイズ（異なれば無効）
    model: String,
    /// ハッシュ → 埋め込み
    entries: HashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    const CURRENT_VERSION: u32 = 1;

    pub fn new(model: &str) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            model: model.to_string(),
            entries: HashMap::new(),
        }
    }

    pub fn cache_path(folder: &Path) -> PathBuf {
        folder.join(CACHE_FILE_NAME)
    }

    /// キャッシュファイルを削除（存在しなければ false）
    pub fn clear(folder: &Path) -> Result<bool> {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(cache_path)?;
        Ok(true)
    }

    /// キャッシュファイルを読み込み（存在しない・不一致なら空）
    pub fn load(folder: &Path, model: &str) -> Self {
        let Ok(file) = File::open(Self::cache_path(folder)) else {
            return Self::new(model);
        };

        match serde_json::from_reader::<_, EmbeddingCache>(BufReader::new(file)) {
            Ok(cache) if cache.version != Self::CURRENT_VERSION => {
                log::warn!("キャッシュバージョン不一致、再生成します");
                Self::new(model)
            }
            Ok(cache) if cache.model != model => {
                log::warn!("キャッシュのモデルが異なります ({} != {})、再生成します", cache.model, model);
                Self::new(model)
            }
            Ok(cache) => cache,
            Err(e) => {
                log::warn!("キャッシュ読み込みに失敗、再生成します: {}", e);
                Self::new(model)
            }
        }
    }

    /// キャッシュファイルを保存
    pub fn save(&self, folder: &Path) -> Result<()> {
        let file = File::create(Self::cache_path(folder))?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Vec<f32>> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, embedding: Vec<f32>) {
        self.entries.insert(key, embedding);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 画像ファイルのキャッシュキー
pub fn image_key(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("img:{}", hex::encode(Sha256::digest(&bytes))))
}

/// テキストのキャッシュキー
pub fn text_key(text: &str) -> String {
    format!("txt:{}", hex::encode(Sha256::digest(text.as_bytes())))
}
