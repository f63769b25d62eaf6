//! CLIPScore 計算の結合テスト
//!
//! 埋め込みを固定値で返すエンコーダで、スコアの値・キャッシュ・出力を検証

use image::{Rgb, RgbImage};
use labvad::clipscore::{
    compute_scores, run_score, ClipEncoder, EmbeddingCache, ImageTensor, ScoreJob, ScoreOptions, CACHE_FILE_NAME,
};
use labvad::error::{LabVadError, Result};
use labvad_common::{parse_clip_results, Record, DEFAULT_WEIGHT};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// 画像は常に [1, 0, 0]、テキストは "missing" を含めば [1, 0, 0]、それ以外は [0, 1, 0]
#[derive(Default)]
struct FakeEncoder {
    image_calls: usize,
    text_calls: usize,
}

impl ClipEncoder for FakeEncoder {
    async fn encode_image(&mut self, image: &ImageTensor) -> Result<Vec<f32>> {
        assert_eq!(image.shape, [3, 16, 16]);
        self.image_calls += 1;
        Ok(vec![1.0, 0.0, 0.0])
    }

    async fn encode_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.text_calls += 1;
        Ok(texts
            .iter()
            .map(|t| {
                if t.to_lowercase().contains("missing") {
                    vec![1.0, 0.0, 0.0]
                } else {
                    vec![0.0, 1.0, 0.0]
                }
            })
            .collect())
    }
}

fn options() -> ScoreOptions {
    ScoreOptions {
        weight: DEFAULT_WEIGHT,
        text_prefix: "A photo depicts".into(),
        image_size: 16,
    }
}

fn write_image(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(20, 12, Rgb([120, 80, 40])).save(&path).unwrap();
}

fn record(image_id: &str, description: &str, caption: Option<&str>) -> Record {
    Record {
        image_id: image_id.into(),
        anomaly_label: true,
        anomaly_label_description: Some(description.into()),
        caption: caption.map(str::to_string),
        views: Some("left-down view".into()),
        distance: Some("near".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_scores_per_record_in_input_order() {
    let dir = tempdir().unwrap();
    write_image(dir.path(), "data/image/0001.png");

    let records = vec![
        record("data/image/0001.png", "The test tube is missing.", Some("A tube is missing from the rack.")),
        record("data/image/0001.png", "The rack is full.", None),
        record("data/image/0002.png", "The test tube is missing.", Some("caption")),
    ];

    let mut encoder = FakeEncoder::default();
    let mut cache = EmbeddingCache::new("fake@16");
    let results = compute_scores(&records, dir.path(), None, &mut encoder, &mut cache, &options(), false)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].image_id, "data/image/0001.png");

    // 一致する記述: cos = 1 → CLIPScore = w、参照も一致 → HMean(w, 1)
    let clip = results[0].clip_score.unwrap();
    assert!((clip - DEFAULT_WEIGHT).abs() < 1e-6);
    let expected_ref = 2.0 * DEFAULT_WEIGHT / (DEFAULT_WEIGHT + 1.0);
    assert!((results[0].ref_clip_score.unwrap() - expected_ref).abs() < 1e-6);
    assert_eq!(results[0].caption, "A tube is missing from the rack.");
    assert_eq!(results[0].distance.as_deref(), Some("near"));
    assert_eq!(results[0].view, Some(1));

    // 直交する記述: cos = 0 → 0、参照なし → None
    assert_eq!(results[1].clip_score, Some(0.0));
    assert_eq!(results[1].ref_clip_score, None);

    // 画像が無い → 両方 None
    assert_eq!(results[2].clip_score, None);
    assert_eq!(results[2].ref_clip_score, None);
    assert!(results[2].absolute_path.ends_with("0002.png"));

    // 同じ画像は1回だけエンコード
    assert_eq!(encoder.image_calls, 1);
}

#[tokio::test]
async fn test_clip_score_within_weight_range() {
    let dir = tempdir().unwrap();
    write_image(dir.path(), "0001.png");
    let records: Vec<Record> = ["missing tube", "full rack", "MISSING cap", ""]
        .iter()
        .map(|d| record("0001.png", d, None))
        .collect();

    let mut encoder = FakeEncoder::default();
    let mut cache = EmbeddingCache::new("fake@16");
    let results = compute_scores(&records, dir.path(), None, &mut encoder, &mut cache, &options(), false)
        .await
        .unwrap();

    for result in &results {
        let score = result.clip_score.unwrap();
        assert!((0.0..=DEFAULT_WEIGHT).contains(&score), "{}", score);
    }
}

#[tokio::test]
async fn test_run_score_writes_results_and_cache() {
    let dir = tempdir().unwrap();
    write_image(dir.path(), "data/image/0001.png");

    let records = vec![record("data/image/0001.png", "The rack is full.", None)];
    let records_json = dir.path().join("records.json");
    fs::write(&records_json, serde_json::to_string(&records).unwrap()).unwrap();

    let references_json = dir.path().join("references.json");
    fs::write(&references_json, r#"{"data/image/0001.png": ["A full rack."]}"#).unwrap();

    let output = dir.path().join("out").join("clipscore_results.json");
    let job = ScoreJob {
        records_json,
        references_json: Some(references_json),
        output: output.clone(),
        images_root: dir.path().to_path_buf(),
        use_cache: true,
    };

    let mut encoder = FakeEncoder::default();
    let summary = run_score(&job, &mut encoder, &options(), "fake@16").await.unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.scored, 1);

    let results = parse_clip_results(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].clip_score, Some(0.0));
    // CLIPScore が 0 なら調和平均も 0
    assert_eq!(results[0].ref_clip_score, Some(0.0));
    assert!(dir.path().join("out").join(CACHE_FILE_NAME).exists());

    // 2回目はキャッシュから取得
    let mut second = FakeEncoder::default();
    run_score(&job, &mut second, &options(), "fake@16").await.unwrap();
    assert_eq!(second.image_calls, 0);
    assert_eq!(second.text_calls, 0);
}

#[tokio::test]
async fn test_run_score_missing_and_empty_input() {
    let dir = tempdir().unwrap();
    let mut job = ScoreJob {
        records_json: dir.path().join("missing.json"),
        references_json: None,
        output: dir.path().join("clipscore_results.json"),
        images_root: dir.path().to_path_buf(),
        use_cache: false,
    };

    let mut encoder = FakeEncoder::default();
    let result = run_score(&job, &mut encoder, &options(), "fake@16").await;
    assert!(matches!(result, Err(LabVadError::FileNotFound(_))));

    fs::write(dir.path().join("empty.json"), "").unwrap();
    job.records_json = dir.path().join("empty.json");
    let result = run_score(&job, &mut encoder, &options(), "fake@16").await;
    assert!(matches!(result, Err(LabVadError::EmptyInput(_))));
    assert!(!job.output.exists());
}
