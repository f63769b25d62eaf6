//! CLIPScore / RefCLIPScore 評価
//!
//! レコードごとに画像と異常記述の類似度を計算する。
//! 埋め込みは `ClipEncoder` 経由で取得し、同じ画像・テキストはキャッシュで再利用する。

pub mod cache;
pub mod encoder;
pub mod preprocess;

pub use cache::{image_key, text_key, EmbeddingCache, CACHE_FILE_NAME};
pub use encoder::{ClipEncoder, CommandEncoder};
pub use preprocess::{load_and_preprocess, preprocess_image, ImageTensor};

use crate::config::Config;
use crate::error::{LabVadError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use labvad_common::{
    clip_score, cosine_similarity, parse_records, ref_clip_score, view_index, ClipScoreResult, Record,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_OUTPUT: &str = "clipscore_results.json";

/// 画像ID → 追加の参照文
pub type References = HashMap<String, Vec<String>>;

/// スコア計算のパラメータ
#[derive(Debug, Clone)]
pub struct ScoreOptions {
    pub weight: f64,
    pub text_prefix: String,
    pub image_size: u32,
}

impl From<&Config> for ScoreOptions {
    fn from(config: &Config) -> Self {
        Self {
            weight: config.clip_weight,
            text_prefix: config.text_prefix.clone(),
            image_size: config.image_size,
        }
    }
}

impl ScoreOptions {
    fn prefixed(&self, text: &str) -> String {
        format!("{} {}", self.text_prefix, text)
    }
}

/// JSON入力を読み込む（存在しない・空ならエラー）
pub fn read_json_input(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(LabVadError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Err(LabVadError::EmptyInput(path.display().to_string()));
    }
    Ok(content)
}

pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    Ok(parse_records(&read_json_input(path)?)?)
}

pub fn load_references(path: &Path) -> Result<References> {
    Ok(serde_json::from_str(&read_json_input(path)?)?)
}

/// レコードの参照文（キャプション + 追加参照）
fn references_for(record: &Record, extra: Option<&References>) -> Vec<String> {
    let caption = record.caption.as_deref().map(str::trim).filter(|c| !c.is_empty());
    caption
        .map(str::to_string)
        .into_iter()
        .chain(
            extra
                .and_then(|r| r.get(&record.image_id))
                .into_iter()
                .flatten()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        )
        .collect()
}

async fn image_embedding<E: ClipEncoder>(
    encoder: &mut E,
    cache: &mut EmbeddingCache,
    path: &Path,
    image_size: u32,
) -> Result<Vec<f32>> {
    let key = image_key(path)?;
    if let Some(embedding) = cache.get(&key) {
        return Ok(embedding.clone());
    }
    let tensor = load_and_preprocess(path, image_size)?;
    let embedding = encoder.encode_image(&tensor).await?;
    cache.insert(key, embedding.clone());
    Ok(embedding)
}

/// キャッシュに無いテキストだけをまとめてエンコード
async fn text_embeddings<E: ClipEncoder>(
    encoder: &mut E,
    cache: &mut EmbeddingCache,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let keys: Vec<String> = texts.iter().map(|t| text_key(t)).collect();
    let mut missing: Vec<String> = Vec::new();
    for (text, key) in texts.iter().zip(&keys) {
        if cache.get(key).is_none() && !missing.contains(text) {
            missing.push(text.clone());
        }
    }

    if !missing.is_empty() {
        let embeddings = encoder.encode_texts(&missing).await?;
        for (text, embedding) in missing.iter().zip(embeddings) {
            cache.insert(text_key(text), embedding);
        }
    }

    keys.iter()
        .map(|key| {
            cache
                .get(key)
                .cloned()
                .ok_or_else(|| LabVadError::Encoder("テキスト埋め込みが取得できません".into()))
        })
        .collect()
}

/// 1レコード分のスコア
async fn score_record<E: ClipEncoder>(
    record: &Record,
    images_root: &Path,
    references: Option<&References>,
    encoder: &mut E,
    cache: &mut EmbeddingCache,
    options: &ScoreOptions,
) -> Result<ClipScoreResult> {
    let image_path = images_root.join(&record.image_id);
    let absolute_path = image_path
        .canonicalize()
        .or_else(|_| std::path::absolute(&image_path))?;
    let description = record.anomaly_label_description.as_deref().unwrap_or("").trim().to_string();

    let mut result = ClipScoreResult {
        image_id: record.image_id.clone(),
        absolute_path: absolute_path.display().to_string(),
        clip_score: None,
        ref_clip_score: None,
        description: description.clone(),
        caption: record.caption.as_deref().unwrap_or("").trim().to_string(),
        distance: record.distance.clone(),
        view: record.views.as_deref().and_then(view_index),
    };

    if !image_path.is_file() {
        log::warn!("画像が見つかりません: {}", image_path.display());
        return Ok(result);
    }

    let refs = references_for(record, references);
    let texts: Vec<String> = std::iter::once(options.prefixed(&description))
        .chain(refs.iter().map(|r| options.prefixed(r)))
        .collect();

    let image = image_embedding(encoder, cache, &image_path, options.image_size).await?;
    let embeddings = text_embeddings(encoder, cache, &texts).await?;
    let (candidate, reference_embeddings) = embeddings
        .split_first()
        .ok_or_else(|| LabVadError::Encoder("テキスト埋め込みが空です".into()))?;

    let clip = clip_score(cosine_similarity(&image, candidate)?, options.weight);
    let reference_cosines = reference_embeddings
        .iter()
        .map(|r| cosine_similarity(candidate, r))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    result.clip_score = Some(clip);
    result.ref_clip_score = ref_clip_score(clip, &reference_cosines);
    Ok(result)
}

/// 全レコードのスコアを入力順に計算
///
/// # Arguments
/// * `records` - 評価対象レコード
/// * `images_root` - `Image_Id` の基準ディレクトリ
/// * `references` - 画像IDごとの追加参照文
/// * `encoder` - 埋め込みエンコーダ
/// * `cache` - 埋め込みキャッシュ（同一実行内の重複画像にも使う）
/// * `progress` - 進捗バーを表示するか
pub async fn compute_scores<E: ClipEncoder>(
    records: &[Record],
    images_root: &Path,
    references: Option<&References>,
    encoder: &mut E,
    cache: &mut EmbeddingCache,
    options: &ScoreOptions,
    progress: bool,
) -> Result<Vec<ClipScoreResult>> {
    let pb = if progress {
        ProgressBar::new(records.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut results = Vec::with_capacity(records.len());
    for record in records {
        pb.set_message(record.image_id.clone());
        results.push(score_record(record, images_root, references, encoder, cache, options).await?);
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(results)
}

/// 結果をJSONで書き出し
pub fn write_results(path: &Path, results: &[ClipScoreResult]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(results)?)?;
    Ok(())
}

/// score サブコマンドの入力
#[derive(Debug, Clone)]
pub struct ScoreJob {
    pub records_json: PathBuf,
    pub references_json: Option<PathBuf>,
    pub output: PathBuf,
    pub images_root: PathBuf,
    pub use_cache: bool,
}

/// スコアの集計（None を除いた平均）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreSummary {
    pub total: usize,
    pub scored: usize,
    pub mean_clip_score: Option<f64>,
    pub mean_ref_clip_score: Option<f64>,
}

impl ScoreSummary {
    pub fn from_results(results: &[ClipScoreResult]) -> Self {
        fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
            let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            (count > 0).then(|| sum / count as f64)
        }
        Self {
            total: results.len(),
            scored: results.iter().filter(|r| r.clip_score.is_some()).count(),
            mean_clip_score: mean(results.iter().filter_map(|r| r.clip_score)),
            mean_ref_clip_score: mean(results.iter().filter_map(|r| r.ref_clip_score)),
        }
    }
}

/// レコードJSONを読み込み、スコアを計算して書き出す
pub async fn run_score<E: ClipEncoder>(
    job: &ScoreJob,
    encoder: &mut E,
    options: &ScoreOptions,
    model_key: &str,
) -> Result<ScoreSummary> {
    let records = load_records(&job.records_json)?;
    let references = job.references_json.as_deref().map(load_references).transpose()?;

    let cache_dir = job
        .output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let mut cache = if job.use_cache {
        EmbeddingCache::load(&cache_dir, model_key)
    } else {
        EmbeddingCache::new(model_key)
    };

    let results = compute_scores(
        &records,
        &job.images_root,
        references.as_ref(),
        encoder,
        &mut cache,
        options,
        true,
    )
    .await?;

    write_results(&job.output, &results)?;
    if job.use_cache {
        std::fs::create_dir_all(&cache_dir)?;
        cache.save(&cache_dir)?;
        log::debug!("埋め込みキャッシュ {} 件を保存", cache.len());
    }

    Ok(ScoreSummary::from_results(&results))
}
